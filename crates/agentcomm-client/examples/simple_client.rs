use std::sync::Arc;

use agentcomm_client::{AgentComm, DeliveryConfig, DeliveryCoordinator};
use agentcomm_types::{Agent, AgentCapabilities};
use agentcomm_webhook::CallbackRegistry;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Webhook listener shared by every delivery, started once.
    let registry = Arc::new(CallbackRegistry::new());
    tokio::spawn(agentcomm_webhook::serve("127.0.0.1:8000", registry.clone()));

    let coordinator = Arc::new(
        DeliveryCoordinator::new(DeliveryConfig {
            webhook_base_url: Some("http://127.0.0.1:8000".into()),
            ..Default::default()
        })
        .with_webhooks(registry),
    );

    let agent = Agent::new("demo", "http://127.0.0.1:3000").with_capabilities(
        AgentCapabilities {
            streaming: true,
            push_notifications: false,
        },
    );
    let comm = AgentComm::new(agent, coordinator);

    // Stream the response chunk by chunk.
    let mut stream = comm.send_stream("Hello, agent!").await;
    while let Some(chunk) = stream.next().await {
        print!("{chunk}");
    }
    println!();

    // Conversation continuity: the context id from the first response rides
    // along automatically.
    let reply = comm.send("And a follow-up.").await;
    println!("{reply}");
}
