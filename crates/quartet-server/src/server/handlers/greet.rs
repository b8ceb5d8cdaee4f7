use crate::server::streaming::{Accumulator, Producer, Reactor};
use core::time::Duration;
use quartet_core::{
    Error, Result,
    proto::{
        GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesResponse, GreetResponse,
        Greeting, LongGreetRequest, LongGreetResponse,
    },
};

/// Number of responses sent by `GreetManyTimes`.
pub const GREET_REPEAT: u32 = 10;

/// Extracts the first name, failing if the request carried no greeting.
pub fn first_name(greeting: Option<Greeting>) -> Result<String> {
    greeting
        .map(|g| g.first_name)
        .ok_or_else(|| Error::invalid_argument("missing greeting"))
}

pub fn greet(greeting: Option<Greeting>) -> Result<GreetResponse> {
    let name = first_name(greeting)?;
    Ok(GreetResponse {
        result: format!("Hello {name}"),
    })
}

/// Greets the same person [`GREET_REPEAT`] times, numbering each greeting
/// from 1.
#[derive(Debug, Clone)]
pub struct RepeatedGreeting {
    first_name: String,
    sent: u32,
    interval: Duration,
}

impl RepeatedGreeting {
    pub fn new(first_name: impl Into<String>, interval: Duration) -> Self {
        Self {
            first_name: first_name.into(),
            sent: 0,
            interval,
        }
    }
}

impl Producer for RepeatedGreeting {
    type Item = GreetManyTimesResponse;

    async fn next_item(&mut self) -> Option<Result<GreetManyTimesResponse>> {
        if self.sent == GREET_REPEAT {
            return None;
        }
        self.sent += 1;
        Some(Ok(GreetManyTimesResponse {
            result: format!(
                "Hello {}, this is the greet number {}",
                self.first_name, self.sent
            ),
        }))
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Concatenates one greeting per inbound message.
#[derive(Debug, Default)]
pub struct LongGreeting {
    result: String,
}

impl Accumulator for LongGreeting {
    type Request = LongGreetRequest;
    type Output = LongGreetResponse;

    fn accept(&mut self, request: LongGreetRequest) -> Result<()> {
        let name = first_name(request.greeting)?;
        self.result.push_str("Hello ");
        self.result.push_str(&name);
        self.result.push_str("! ");
        Ok(())
    }

    fn finish(self) -> Result<LongGreetResponse> {
        Ok(LongGreetResponse {
            result: self.result,
        })
    }
}

/// Replies to every inbound greeting straight away.
#[derive(Debug, Default)]
pub struct GreetEveryone;

impl Reactor for GreetEveryone {
    type Request = GreetEveryoneRequest;
    type Response = GreetEveryoneResponse;

    fn react(&mut self, request: GreetEveryoneRequest) -> Result<Option<GreetEveryoneResponse>> {
        let name = first_name(request.greeting)?;
        Ok(Some(GreetEveryoneResponse {
            result: format!("Hello {name}! "),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn greeting(first_name: &str) -> Option<Greeting> {
        Some(Greeting {
            first_name: first_name.into(),
            last_name: "Lovelace".into(),
        })
    }

    #[test]
    fn greets_by_first_name() {
        assert_eq!(greet(greeting("Ada")).unwrap().result, "Hello Ada");
    }

    #[test]
    fn missing_greeting_is_invalid() {
        assert_eq!(greet(None).unwrap_err().code(), Code::InvalidArgument);
        let err = GreetEveryone
            .react(GreetEveryoneRequest { greeting: None })
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn repeats_ten_numbered_greetings() {
        let mut producer = RepeatedGreeting::new("Ada", Duration::ZERO);
        let mut results = Vec::new();
        while let Some(item) = producer.next_item().await {
            results.push(item.unwrap().result);
        }
        assert_eq!(results.len(), GREET_REPEAT as usize);
        assert_eq!(results[0], "Hello Ada, this is the greet number 1");
        assert_eq!(results[9], "Hello Ada, this is the greet number 10");
    }

    #[test]
    fn long_greet_concatenates_in_order() {
        let mut acc = LongGreeting::default();
        for name in ["Ada", "Grace", "Linus"] {
            acc.accept(LongGreetRequest {
                greeting: greeting(name),
            })
            .unwrap();
        }
        assert_eq!(
            acc.finish().unwrap().result,
            "Hello Ada! Hello Grace! Hello Linus! "
        );
    }

    #[test]
    fn long_greet_without_greetings_is_empty() {
        assert_eq!(LongGreeting::default().finish().unwrap().result, "");
    }

    #[test]
    fn greet_everyone_replies_to_each() {
        let reply = GreetEveryone
            .react(GreetEveryoneRequest {
                greeting: greeting("Grace"),
            })
            .unwrap();
        assert_eq!(reply.unwrap().result, "Hello Grace! ");
    }
}
