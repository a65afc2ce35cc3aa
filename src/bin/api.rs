use greengain_orchestrator::{
    api::start_server,
    pipeline::Pipeline,
    policy::create_default_policy_engine,
    retrieval::{InMemoryIndex, KnowledgeIndex, PineconeIndex},
    search::{MockWebSearch, TavilyClient, WebSearch},
    synthesis::{
        GeminiGrader, GeminiQuerySynthesizer, GeminiRoadmapSynthesizer, MockGrader,
        MockQuerySynthesizer, MockRoadmapSynthesizer,
    },
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("GreenGain Roadmap Orchestrator - API Server");
    info!("Port: {}", api_port);

    // Knowledge index: Pinecone when configured, in-memory otherwise.
    let index: Arc<dyn KnowledgeIndex> = match PineconeIndex::from_env() {
        Some(index) => Arc::new(index),
        None => {
            warn!("PINECONE_API_KEY / PINECONE_INDEX_HOST / OPENAI_API_KEY not all set; using in-memory index");
            Arc::new(InMemoryIndex::new())
        }
    };

    // Web search: Tavily when configured.
    let web_search: Arc<dyn WebSearch> = match TavilyClient::from_env() {
        Some(client) => Arc::new(client),
        None => {
            warn!("TAVILY_API_KEY not set; using mock web search");
            Arc::new(MockWebSearch)
        }
    };

    // Generative steps: Gemini when configured.
    let pipeline = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Pipeline::new(
            index,
            web_search,
            Box::new(GeminiQuerySynthesizer::new(key.clone())),
            Box::new(GeminiGrader::new(key.clone())),
            Box::new(GeminiRoadmapSynthesizer::new(key)),
            create_default_policy_engine(),
        ),
        _ => {
            warn!("GEMINI_API_KEY not set; using mock generative steps");
            Pipeline::new(
                index,
                web_search,
                Box::new(MockQuerySynthesizer),
                Box::new(MockGrader { pass: true }),
                Box::new(MockRoadmapSynthesizer),
                create_default_policy_engine(),
            )
        }
    };

    info!("Pipeline initialized");
    info!("Starting API server...");

    start_server(Arc::new(pipeline), api_port).await?;

    Ok(())
}
