use anyhow::{Result, bail};
use kernel_application::AppContext;
use kernel_domain::domain_event::EventContext;
use review_service::domain::{Persona, Question, ReviewId, ReviewState};
use review_service::{App, InMemoryCollaborators, ServiceConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("review_service=info".parse()?)
                .add_directive("kernel_domain=info".parse()?),
        )
        .init();

    info!("Review service demo starting...");

    let config = ServiceConfig::from_env()?;
    let fakes = InMemoryCollaborators::new();
    let app = App::start(config, fakes.collaborators());

    let ctx = AppContext {
        biz: EventContext::builder()
            .correlation_id(uuid::Uuid::new_v4().to_string())
            .build(),
    };

    let review_id = ReviewId::new(uuid::Uuid::new_v4().to_string());
    let reviews = app.reviews();
    reviews
        .start(&ctx, review_id.clone(), "reviewer".into(), "doi:10.1101/2024.01.01.000001".into())
        .await?;
    for (question, answer) in [
        (Question::Summary, "The preprint is clearly written."),
        (Question::CompetingInterests, "None."),
        (Question::CodeOfConduct, "Yes."),
    ] {
        reviews
            .answer_question(&ctx, review_id.clone(), "reviewer".into(), question, answer)
            .await?;
    }
    reviews
        .request_publication(&ctx, review_id.clone(), "reviewer".into())
        .await?;

    let published = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = reviews.state(&review_id).await?;
            if let ReviewState::Published {
                doi,
                announced: true,
                ..
            } = state
            {
                return Ok::<_, anyhow::Error>(doi);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    let doi = match published {
        Ok(result) => result?,
        Err(_) => bail!("review {review_id} was not published in time"),
    };
    info!(review_id = %review_id, doi = %doi, "review published");

    let requests = app.review_requests();
    let request_id = "request-1";
    requests
        .start(&ctx, request_id.into(), "author".into(), "doi:10.1101/2024.02.02.000002".into())
        .await?;
    requests
        .choose_persona(&ctx, request_id.into(), "author".into(), Persona::Public)
        .await?;
    requests.publish(&ctx, request_id.into(), "author".into()).await?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    for (channel, message) in fakes.chat.sent().await {
        info!(channel = %channel, text = %message.text, link = ?message.link, "notification");
    }

    app.shutdown().await;
    Ok(())
}
