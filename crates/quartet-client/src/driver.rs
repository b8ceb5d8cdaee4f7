//! Issues calls of every convention against a quartet server.
//!
//! Each call is tracked in a [`Call`]. Streamed requests come from a send
//! loop spawned per call; it owns the request [`Lane`], paces requests by
//! the driver interval and half-closes by dropping its sender. Streamed
//! responses are drained by a receive loop that owns the response lane and
//! hands each message to the caller as soon as it arrives. For
//! bidirectional calls both loops run concurrently and are joined once,
//! after which the lanes are reassembled with [`Call::join`].
//!
//! Every streaming method has an `_each` form taking a callback, and a
//! collecting form built on it.

use core::{future::Future, time::Duration};
use quartet_core::{
    Error, Result,
    call::{Call, Convention, Lane},
    proto::{
        ComputeAverageRequest, CreateBlogRequest, DecomposeFactorsRequest,
        DecomposeFactorsResponse, DeleteBlogRequest, FindMaximumRequest, FindMaximumResponse,
        GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest,
        GreetManyTimesResponse, GreetRequest, Greeting, LongGreetRequest, ReadBlogRequest,
        SumRequest, UpdateBlogRequest,
        compute_service_client::ComputeServiceClient, entity_service_client::EntityServiceClient,
        greet_service_client::GreetServiceClient,
    },
    types::Entity,
};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tonic::{Status, codec::CompressionEncoding, transport::Channel};

/// A connected client for all three services.
#[derive(Clone, Debug)]
pub struct Driver {
    channel: Channel,
    interval: Duration,
}

impl Driver {
    /// Connects to `endpoint`, e.g. `http://127.0.0.1:50051`.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let channel = Channel::from_shared(endpoint.clone())
            .map_err(|e| Error::Connect {
                context: format!("invalid endpoint {endpoint}: {e}"),
            })?
            .connect()
            .await
            .map_err(|e| Error::Connect {
                context: format!("cannot reach {endpoint}: {e}"),
            })?;
        Ok(Self::from_channel(channel))
    }

    pub const fn from_channel(channel: Channel) -> Self {
        Self {
            channel,
            interval: Duration::ZERO,
        }
    }

    /// Delay between consecutive streamed requests.
    #[must_use]
    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    fn greet_client(&self) -> GreetServiceClient<Channel> {
        GreetServiceClient::new(self.channel.clone())
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
    }

    fn compute_client(&self) -> ComputeServiceClient<Channel> {
        ComputeServiceClient::new(self.channel.clone())
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
    }

    fn entity_client(&self) -> EntityServiceClient<Channel> {
        EntityServiceClient::new(self.channel.clone())
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
    }

    // === GreetService ===

    pub async fn greet(&self, greeting: Greeting) -> Result<String> {
        let response = self
            .greet_client()
            .greet(GreetRequest {
                greeting: Some(greeting),
            })
            .await?;
        Ok(response.into_inner().result)
    }

    pub async fn greet_many_times(&self, greeting: Greeting) -> Result<Vec<String>> {
        let mut greetings = Vec::new();
        self.greet_many_times_each(greeting, |line| greetings.push(line))
            .await?;
        Ok(greetings)
    }

    pub async fn greet_many_times_each(
        &self,
        greeting: Greeting,
        mut on_greeting: impl FnMut(String) + Send,
    ) -> Result<()> {
        let mut client = self.greet_client();
        self.server_streaming(
            GreetManyTimesRequest {
                greeting: Some(greeting),
            },
            |request| async move { client.greet_many_times(request).await },
            |response: GreetManyTimesResponse| on_greeting(response.result),
        )
        .await
    }

    pub async fn long_greet(&self, greetings: Vec<Greeting>) -> Result<String> {
        let requests = greetings
            .into_iter()
            .map(|greeting| LongGreetRequest {
                greeting: Some(greeting),
            })
            .collect();
        let mut client = self.greet_client();
        let response = self
            .client_streaming(requests, |outbound| async move {
                client.long_greet(outbound).await
            })
            .await?;
        Ok(response.result)
    }

    pub async fn greet_everyone(&self, greetings: Vec<Greeting>) -> Result<Vec<String>> {
        let mut replies = Vec::new();
        self.greet_everyone_each(greetings, |line| replies.push(line))
            .await?;
        Ok(replies)
    }

    pub async fn greet_everyone_each(
        &self,
        greetings: Vec<Greeting>,
        mut on_greeting: impl FnMut(String) + Send,
    ) -> Result<()> {
        let requests = greetings
            .into_iter()
            .map(|greeting| GreetEveryoneRequest {
                greeting: Some(greeting),
            })
            .collect();
        let mut client = self.greet_client();
        self.bidirectional(
            requests,
            |outbound| async move { client.greet_everyone(outbound).await },
            |response: GreetEveryoneResponse| on_greeting(response.result),
        )
        .await
    }

    // === ComputeService ===

    pub async fn sum(&self, first: i64, second: i64) -> Result<i64> {
        let response = self
            .compute_client()
            .sum(SumRequest { first, second })
            .await?;
        Ok(response.into_inner().result)
    }

    /// Returns every running maximum the server emitted, in order.
    pub async fn find_maximum(&self, numbers: Vec<i64>) -> Result<Vec<i64>> {
        let mut maxima = Vec::new();
        self.find_maximum_each(numbers, |maximum| maxima.push(maximum))
            .await?;
        Ok(maxima)
    }

    /// Calls `on_maximum` for each new running maximum while numbers are
    /// still being sent.
    pub async fn find_maximum_each(
        &self,
        numbers: Vec<i64>,
        mut on_maximum: impl FnMut(i64) + Send,
    ) -> Result<()> {
        let requests = numbers
            .into_iter()
            .map(|number| FindMaximumRequest { number })
            .collect();
        let mut client = self.compute_client();
        self.bidirectional(
            requests,
            |outbound| async move { client.find_maximum(outbound).await },
            |response: FindMaximumResponse| on_maximum(response.maximum),
        )
        .await
    }

    pub async fn compute_average(&self, numbers: Vec<i64>) -> Result<f64> {
        let requests = numbers
            .into_iter()
            .map(|number| ComputeAverageRequest { number })
            .collect();
        let mut client = self.compute_client();
        let response = self
            .client_streaming(requests, |outbound| async move {
                client.compute_average(outbound).await
            })
            .await?;
        Ok(response.average)
    }

    pub async fn decompose_factors(&self, number: i64) -> Result<Vec<i64>> {
        let mut factors = Vec::new();
        self.decompose_factors_each(number, |factor| factors.push(factor))
            .await?;
        Ok(factors)
    }

    pub async fn decompose_factors_each(
        &self,
        number: i64,
        mut on_factor: impl FnMut(i64) + Send,
    ) -> Result<()> {
        let mut client = self.compute_client();
        self.server_streaming(
            DecomposeFactorsRequest { number },
            |request| async move { client.decompose_factors(request).await },
            |response: DecomposeFactorsResponse| on_factor(response.factor),
        )
        .await
    }

    // === EntityService ===

    pub async fn create_blog(&self, entity: Entity) -> Result<Entity> {
        let response = self
            .entity_client()
            .create(CreateBlogRequest {
                blog: Some(entity.into()),
            })
            .await?;
        blog_of(response.into_inner().blog)
    }

    pub async fn read_blog(&self, blog_id: impl Into<String>) -> Result<Entity> {
        let response = self
            .entity_client()
            .read(ReadBlogRequest {
                blog_id: blog_id.into(),
            })
            .await?;
        blog_of(response.into_inner().blog)
    }

    pub async fn update_blog(&self, entity: Entity) -> Result<Entity> {
        let response = self
            .entity_client()
            .update(UpdateBlogRequest {
                blog: Some(entity.into()),
            })
            .await?;
        blog_of(response.into_inner().blog)
    }

    /// Returns the id of the deleted blog.
    pub async fn delete_blog(&self, blog_id: impl Into<String>) -> Result<String> {
        let response = self
            .entity_client()
            .delete(DeleteBlogRequest {
                blog_id: blog_id.into(),
            })
            .await?;
        Ok(response.into_inner().blog_id)
    }

    // === Convention drivers ===

    /// Sends the single request and hands every streamed response to
    /// `on_message` until end-of-stream.
    async fn server_streaming<Req, Resp, F, Fut, S>(
        &self,
        request: Req,
        invoke: F,
        on_message: impl FnMut(Resp) + Send,
    ) -> Result<()>
    where
        S: Stream<Item = core::result::Result<Resp, Status>> + Unpin + Send,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = core::result::Result<tonic::Response<S>, Status>>,
    {
        let mut call = Call::new(Convention::ServerStreaming);
        call.record_request()?;
        call.half_close()?;
        let inbound = invoke(request).await?.into_inner();

        let (requests, responses) = call.split();
        let (responses, result) = receive_loop(inbound, responses, on_message).await;
        settle(Convention::ServerStreaming, requests, responses)?;
        result
    }

    /// Streams `requests` through a paced send loop and waits for the single
    /// response, which the server only sends after the half-close.
    async fn client_streaming<Req, Resp, F, Fut>(
        &self,
        requests: Vec<Req>,
        invoke: F,
    ) -> Result<Resp>
    where
        Req: Send + 'static,
        F: FnOnce(ReceiverStream<Req>) -> Fut,
        Fut: Future<Output = core::result::Result<tonic::Response<Resp>, Status>>,
    {
        let (request_lane, mut response_lane) = Call::new(Convention::ClientStreaming).split();
        let (outbound, sender) = spawn_send_loop(requests, self.interval, request_lane);

        let result = invoke(outbound).await;
        let request_lane = join_task(sender).await?;

        match result {
            Ok(response) => {
                response_lane.record()?;
                response_lane.end()?;
                settle(Convention::ClientStreaming, request_lane, response_lane)?;
                Ok(response.into_inner())
            }
            Err(status) => {
                response_lane.fail();
                let _ = settle(Convention::ClientStreaming, request_lane, response_lane);
                Err(status.into())
            }
        }
    }

    /// Runs the spawned send loop and the receive loop concurrently and
    /// joins them once both lanes are terminal. Sending never waits for a
    /// response.
    async fn bidirectional<Req, Resp, F, Fut, S>(
        &self,
        requests: Vec<Req>,
        invoke: F,
        on_message: impl FnMut(Resp) + Send,
    ) -> Result<()>
    where
        Req: Send + 'static,
        S: Stream<Item = core::result::Result<Resp, Status>> + Unpin + Send,
        F: FnOnce(ReceiverStream<Req>) -> Fut,
        Fut: Future<Output = core::result::Result<tonic::Response<S>, Status>>,
    {
        let (request_lane, response_lane) = Call::new(Convention::Bidirectional).split();
        let (outbound, sender) = spawn_send_loop(requests, self.interval, request_lane);

        let inbound = match invoke(outbound).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                sender.abort();
                return Err(status.into());
            }
        };

        let (request_lane, (response_lane, result)) = tokio::join!(
            join_task(sender),
            receive_loop(inbound, response_lane, on_message)
        );
        let request_lane = request_lane?;

        settle(Convention::Bidirectional, request_lane, response_lane)?;
        result
    }
}

/// Feeds `requests` into a bounded channel, one every `interval`. Dropping
/// the sender at the end is the half-close. Returns the request lane once
/// it is terminal.
fn spawn_send_loop<T: Send + 'static>(
    requests: Vec<T>,
    interval: Duration,
    mut lane: Lane,
) -> (ReceiverStream<T>, JoinHandle<Lane>) {
    let (tx, rx) = mpsc::channel(1);

    let handle = tokio::spawn(async move {
        for (i, request) in requests.into_iter().enumerate() {
            if i > 0 && !interval.is_zero() {
                tokio::select! {
                    () = tx.closed() => {
                        lane.fail();
                        return lane;
                    }
                    () = sleep(interval) => {}
                }
            }
            if lane.record().is_err() || tx.send(request).await.is_err() {
                // The call ended before we were done sending.
                lane.fail();
                return lane;
            }
        }
        if lane.end().is_err() {
            lane.fail();
        }
        lane
    });

    (ReceiverStream::new(rx), handle)
}

/// Drains `inbound` until end-of-stream or the first error, handing each
/// message to `on_message` as it arrives.
async fn receive_loop<T, S>(
    mut inbound: S,
    mut lane: Lane,
    mut on_message: impl FnMut(T),
) -> (Lane, Result<()>)
where
    S: Stream<Item = core::result::Result<T, Status>> + Unpin,
{
    loop {
        match inbound.next().await {
            Some(Ok(message)) => {
                if let Err(e) = lane.record() {
                    lane.fail();
                    return (lane, Err(e));
                }
                on_message(message);
            }
            Some(Err(status)) => {
                lane.fail();
                return (lane, Err(status.into()));
            }
            None => {
                if let Err(e) = lane.end() {
                    lane.fail();
                    return (lane, Err(e));
                }
                return (lane, Ok(()));
            }
        }
    }
}

async fn join_task<T>(handle: JoinHandle<T>) -> Result<T> {
    handle.await.map_err(|e| Error::ChannelError {
        context: format!("call loop failed: {e}"),
    })
}

/// Reassembles the call and checks it closed.
fn settle(convention: Convention, requests: Lane, responses: Lane) -> Result<Call> {
    let call = Call::join(convention, requests, responses)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        "{convention} call closed in state {:?} after {} requests and {} responses",
        call.state(),
        call.requests().messages(),
        call.responses().messages()
    );
    if !call.is_closed() {
        return Err(Error::protocol(format!(
            "{convention} call completed with a lane still open"
        )));
    }
    Ok(call)
}

fn blog_of(blog: Option<quartet_core::proto::Blog>) -> Result<Entity> {
    blog.map(Entity::from)
        .ok_or_else(|| Error::protocol("response is missing its blog"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartet_core::call::{CallState, Terminal};
    use tonic::Code;

    fn lanes(convention: Convention) -> (Lane, Lane) {
        Call::new(convention).split()
    }

    #[tokio::test]
    async fn send_loop_half_closes_after_last_request() {
        let (requests, _) = lanes(Convention::Bidirectional);
        let (mut outbound, sender) = spawn_send_loop(vec![1, 2, 3], Duration::ZERO, requests);

        let mut seen = Vec::new();
        while let Some(n) = outbound.next().await {
            seen.push(n);
        }
        let lane = sender.await.unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(lane.messages(), 3);
        assert_eq!(lane.terminal(), Some(Terminal::EndOfStream));
    }

    #[tokio::test]
    async fn send_loop_stops_when_the_call_goes_away() {
        let (requests, _) = lanes(Convention::ClientStreaming);
        let (outbound, sender) =
            spawn_send_loop(vec![1, 2, 3], Duration::from_secs(3600), requests);
        drop(outbound);

        let lane = tokio::time::timeout(Duration::from_secs(1), sender)
            .await
            .expect("send loop kept sleeping after the receiver dropped")
            .unwrap();
        assert_eq!(lane.terminal(), Some(Terminal::Failed));
    }

    #[tokio::test]
    async fn receive_loop_observes_end_of_stream() {
        let (_, responses) = lanes(Convention::Bidirectional);
        let inbound = tokio_stream::iter(Vec::<core::result::Result<i64, Status>>::new());
        let mut seen = Vec::new();
        let (lane, result) = receive_loop(inbound, responses, |n| seen.push(n)).await;
        result.unwrap();
        assert!(seen.is_empty());
        assert_eq!(lane.terminal(), Some(Terminal::EndOfStream));
    }

    #[tokio::test]
    async fn receive_loop_stops_at_the_first_error() {
        let (_, responses) = lanes(Convention::ServerStreaming);
        let inbound = tokio_stream::iter(vec![
            Ok(2),
            Err(Status::invalid_argument("bad")),
            Ok(3),
        ]);
        let mut seen = Vec::new();
        let (lane, result) = receive_loop(inbound, responses, |n| seen.push(n)).await;
        assert_eq!(result.unwrap_err().code(), Code::InvalidArgument);
        assert_eq!(seen, vec![2]);
        assert_eq!(lane.messages(), 1);
        assert_eq!(lane.terminal(), Some(Terminal::Failed));
    }

    #[tokio::test]
    async fn empty_bidirectional_exchange_settles_closed() {
        let (requests, responses) = lanes(Convention::Bidirectional);
        let (outbound, sender) = spawn_send_loop(Vec::<i64>::new(), Duration::ZERO, requests);
        // Echo server: ends its stream when ours ends.
        let inbound = outbound.map(Ok::<_, Status>);
        let mut seen = Vec::new();
        let (requests, (responses, result)) =
            tokio::join!(sender, receive_loop(inbound, responses, |n: i64| seen.push(n)));
        let call = settle(Convention::Bidirectional, requests.unwrap(), responses).unwrap();
        result.unwrap();
        assert!(seen.is_empty());
        assert_eq!(call.state(), CallState::Closed);
        assert!(call.succeeded());
    }

    #[tokio::test]
    async fn messages_are_handed_over_before_the_stream_ends() {
        let (_, responses) = lanes(Convention::ServerStreaming);
        let (server, inbound) = mpsc::channel::<core::result::Result<i64, Status>>(4);
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let receiver = tokio::spawn(receive_loop(
            ReceiverStream::new(inbound),
            responses,
            move |n| {
                let _ = seen_tx.send(n);
            },
        ));

        server.send(Ok(2)).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(1), seen.recv())
            .await
            .expect("first message held back until the stream ended");
        assert_eq!(first, Some(2));
        assert!(!receiver.is_finished());

        server.send(Ok(3)).await.unwrap();
        drop(server);
        let (lane, result) = receiver.await.unwrap();
        result.unwrap();
        assert_eq!(seen.recv().await, Some(3));
        assert_eq!(lane.messages(), 2);
        assert_eq!(lane.terminal(), Some(Terminal::EndOfStream));
    }

    #[test]
    fn settle_rejects_open_lanes() {
        let (requests, responses) = lanes(Convention::Bidirectional);
        assert!(settle(Convention::Bidirectional, requests, responses).is_err());
    }
}
