use greengain_orchestrator::{
    models::{ContextItem, ContextKind, Profile},
    pipeline::Pipeline,
    policy::create_default_policy_engine,
    retrieval::{InMemoryIndex, IndexRecord},
    search::MockWebSearch,
    synthesis::{MockGrader, MockQuerySynthesizer, MockRoadmapSynthesizer},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("GreenGain Roadmap Orchestrator starting");

    // Seed a small local knowledge base so the demo takes the local route.
    let index = Arc::new(InMemoryIndex::new());
    index
        .insert(IndexRecord {
            item: ContextItem {
                text: "Austin Energy heat pump rebates up to $2,500 for qualified homes"
                    .to_string(),
                source: "Austin Energy".to_string(),
                kind: ContextKind::UtilityRebate,
                url: Some("https://example.gov/rebates/heat-pump".to_string()),
            },
            location: Some("local".to_string()),
            zip_codes: vec!["78704".to_string()],
        })
        .await;

    let pipeline = Pipeline::new(
        index,
        Arc::new(MockWebSearch),
        Box::new(MockQuerySynthesizer),
        Box::new(MockGrader { pass: true }),
        Box::new(MockRoadmapSynthesizer),
        create_default_policy_engine(),
    );

    let profile = Profile {
        zip_code: "78704".to_string(),
        ownership_status: "own".to_string(),
        home_type: "single_family".to_string(),
        income_range: "$80,000 - $120,000".to_string(),
        heating_system: "gas furnace".to_string(),
        home_age_year: Some(1985),
        monthly_electric_bill: Some(180.0),
        monthly_gas_bill: Some(60.0),
    };

    info!(zip = %profile.zip_code, "Running pipeline");

    match pipeline.run_pipeline(profile).await {
        Ok(Some(roadmap)) => {
            println!("\n=== ENERGY ROADMAP ===");
            println!("Summary: {}", roadmap.summary_text);
            println!(
                "Projected yearly savings: ${:.0}",
                roadmap.total_projected_savings_yearly
            );
            for rec in &roadmap.recommendations {
                println!(
                    "  [{}] {} — cost ${:.0}, rebates ${:.0}, federal credit ${:.0}, saves ${:.0}/mo{}",
                    rec.kind,
                    rec.name,
                    rec.estimated_cost,
                    rec.rebate_amount,
                    rec.federal_credit,
                    rec.estimated_monthly_savings,
                    rec.roi_years
                        .map(|y| format!(", ROI {:.1} yr", y))
                        .unwrap_or_default(),
                );
            }
            println!("\n{}", roadmap.disclosure);
            Ok(())
        }
        Ok(None) => {
            println!("No roadmap could be generated for this profile.");
            Ok(())
        }
        Err(e) => {
            eprintln!("Pipeline failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
