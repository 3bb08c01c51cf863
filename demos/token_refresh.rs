//! Request a person's profile, refreshing the access token when the first
//! request is rejected.

use kusari::prelude::*;
use std::time::Duration;

#[derive(Debug, Default, thiserror::Error)]
#[error("token service unavailable")]
struct TokenUnavailable;

struct MockRequestService;

impl MockRequestService {
    fn ping() -> Outcome {
        println!("Invoked ping");
        Outcome::ok()
    }

    async fn request_token() -> Outcome {
        println!("Invoked request_token");
        tokio::time::sleep(Duration::from_millis(20)).await;
        Outcome::ok()
    }

    fn request_person_info() -> Outcome {
        println!("Invoked request_person_info");
        Outcome::failed_with("person info", String::new())
    }

    async fn update_token_and_request_person_info() -> Outcome {
        println!("Invoked update_token_and_request_person_info");
        tokio::time::sleep(Duration::from_millis(20)).await;
        Outcome::ok_with("new person info".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut chain = Chain::builder();

    let ping = chain.continue_with(MockRequestService::ping);
    chain.on_failed(ping, |message| eprintln!("Ping failed: {}", message))?;

    let token = chain.continue_with_async(MockRequestService::request_token, false);
    chain.throw_on_failed::<TokenUnavailable>(token)?;

    let info = chain.continue_with(MockRequestService::request_person_info);
    chain.continue_on_failed_async(
        info,
        MockRequestService::update_token_and_request_person_info,
        false,
    )?;

    let chain = chain.build();
    let cancel = CancellationToken::new();

    match chain.execute_async_typed::<String>(&cancel).await {
        Ok(person) if person.is_ok() => println!("Person info: {}", person.value()),
        Ok(person) => eprintln!("Chain failed: {}", person.message()),
        Err(ChainError::Escalated(escalation)) => {
            eprintln!("Chain escalated at {}: {}", escalation.step(), escalation.error());
        }
        Err(error) => return Err(error.into()),
    }

    Ok(())
}
