//! End-to-end calls through a real tonic server on an ephemeral port.

use core::time::Duration;
use quartet_client::Driver;
use quartet_core::{proto::Greeting, types::Entity};
use quartet_server::server::{
    config::ServerConfig,
    serve::serve_with_incoming,
    service::Services,
    store::{self, StoreUri},
};
use std::path::PathBuf;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle, time::timeout};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::Code;

struct TestServer {
    driver: Driver,
    services: Services,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(store_uri: StoreUri, stream_interval: Duration) -> Self {
        let config = ServerConfig {
            server_addr: "127.0.0.1:0".into(),
            uds: false,
            store_uri,
            stream_buffer_size: 8,
            stream_interval,
            shutdown_timeout: Duration::from_millis(200),
        };
        let store = store::open(&config.store_uri).await.unwrap();
        let services = Services::new(&config, store);

        let listener = TcpListener::bind(&config.server_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_with_incoming(
            services.clone(),
            TcpListenerStream::new(listener),
            async {
                let _ = rx.await;
            },
        ));

        let driver = Driver::connect(format!("http://{addr}")).await.unwrap();
        Self {
            driver,
            services,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn memory() -> Self {
        Self::start(StoreUri::Memory, Duration::ZERO).await
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

fn person(first_name: &str) -> Greeting {
    Greeting {
        first_name: first_name.into(),
        last_name: "Hopper".into(),
    }
}

#[tokio::test]
async fn greet_service_covers_every_convention() {
    let server = TestServer::memory().await;
    let driver = &server.driver;

    assert_eq!(driver.greet(person("Grace")).await.unwrap(), "Hello Grace");

    let many = driver.greet_many_times(person("Grace")).await.unwrap();
    assert_eq!(many.len(), 10);
    assert_eq!(many[0], "Hello Grace, this is the greet number 1");
    assert_eq!(many[9], "Hello Grace, this is the greet number 10");

    let long = driver
        .long_greet(vec![person("Ada"), person("Grace")])
        .await
        .unwrap();
    assert_eq!(long, "Hello Ada! Hello Grace! ");
    assert_eq!(driver.long_greet(vec![]).await.unwrap(), "");

    let everyone = driver
        .greet_everyone(vec![person("Ada"), person("Grace"), person("Linus")])
        .await
        .unwrap();
    assert_eq!(everyone, vec!["Hello Ada! ", "Hello Grace! ", "Hello Linus! "]);

    server.stop().await;
}

#[tokio::test]
async fn compute_service_covers_every_convention() {
    let server = TestServer::memory().await;
    let driver = &server.driver;

    assert_eq!(driver.sum(3, 10).await.unwrap(), 13);
    let overflow = driver.sum(i64::MAX, 1).await.unwrap_err();
    assert_eq!(overflow.code(), Code::InvalidArgument);

    let maxima = driver.find_maximum(vec![1, 5, 3, 6, 2, 20]).await.unwrap();
    assert_eq!(maxima, vec![1, 5, 6, 20]);

    let average = driver.compute_average(vec![1, 3, 3, 5, 2]).await.unwrap();
    assert!((average - 2.8).abs() < f64::EPSILON);

    let factors = driver.decompose_factors(120).await.unwrap();
    assert_eq!(factors, vec![2, 2, 2, 3, 5]);
    assert!(driver.decompose_factors(1).await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn paced_sends_continue_while_the_server_stays_silent() {
    let server = TestServer::memory().await;
    let driver = server
        .driver
        .clone()
        .with_interval(Duration::from_millis(20));

    // Only the first number is a new maximum; the other four get no reply.
    let started = std::time::Instant::now();
    let maxima = timeout(Duration::from_secs(5), driver.find_maximum(vec![5, 4, 3, 2, 1]))
        .await
        .expect("send loop waited on a response that never came")
        .unwrap();
    assert_eq!(maxima, vec![5]);
    assert!(started.elapsed() >= Duration::from_millis(80));

    server.stop().await;
}

#[tokio::test]
async fn streamed_factors_arrive_before_the_stream_ends() {
    let server = TestServer::start(StoreUri::Memory, Duration::from_secs(3600)).await;

    let driver = server.driver.clone();
    let (seen_tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    let call = tokio::spawn(async move {
        driver
            .decompose_factors_each(120, move |factor| {
                let _ = seen_tx.send(factor);
            })
            .await
    });

    let first = timeout(Duration::from_secs(5), seen.recv())
        .await
        .expect("first factor held back until the stream ended");
    assert_eq!(first, Some(2));
    assert!(!call.is_finished());

    server.stop().await;
    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}

#[tokio::test]
async fn empty_average_is_rejected() {
    let server = TestServer::memory().await;
    let err = timeout(Duration::from_secs(5), server.driver.compute_average(vec![]))
        .await
        .expect("empty client stream hung")
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    server.stop().await;
}

#[tokio::test]
async fn bidirectional_with_immediate_half_close_ends_cleanly() {
    let server = TestServer::memory().await;
    let maxima = timeout(Duration::from_secs(5), server.driver.find_maximum(vec![]))
        .await
        .expect("empty bidirectional call deadlocked")
        .unwrap();
    assert!(maxima.is_empty());
    assert_eq!(server.services.lifecycle().inflight(), 0);
    server.stop().await;
}

#[tokio::test]
async fn blog_crud_round_trip() {
    let server = TestServer::memory().await;
    let driver = &server.driver;

    let created = driver
        .create_blog(Entity::new("ada", "Notes", "On the Analytical Engine"))
        .await
        .unwrap();
    let id = created.id.clone().unwrap();

    let read = driver.read_blog(id.clone()).await.unwrap();
    assert_eq!(read, created);

    let edited = Entity::new("ada", "Notes, revised", "Note G").with_id(id.clone());
    assert_eq!(driver.update_blog(edited.clone()).await.unwrap(), edited);
    assert_eq!(driver.read_blog(id.clone()).await.unwrap(), edited);

    assert_eq!(driver.delete_blog(id.clone()).await.unwrap(), id);
    let again = driver.delete_blog(id.clone()).await.unwrap_err();
    assert_eq!(again.code(), Code::NotFound);

    server.stop().await;
}

#[tokio::test]
async fn blog_ids_are_validated() {
    let server = TestServer::memory().await;
    let driver = &server.driver;

    let malformed = driver.read_blog("not-an-object-id").await.unwrap_err();
    assert_eq!(malformed.code(), Code::InvalidArgument);

    let missing = driver
        .read_blog("000000000000000000000000")
        .await
        .unwrap_err();
    assert_eq!(missing.code(), Code::NotFound);

    let no_id = driver
        .update_blog(Entity::new("ada", "Untitled", ""))
        .await
        .unwrap_err();
    assert_eq!(no_id.code(), Code::InvalidArgument);

    server.stop().await;
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("blogs.json");

    let server = TestServer::start(StoreUri::File(path.clone()), Duration::ZERO).await;
    let created = server
        .driver
        .create_blog(Entity::new("linus", "Kernel", "Just a hobby"))
        .await
        .unwrap();
    server.stop().await;

    let server = TestServer::start(StoreUri::File(path), Duration::ZERO).await;
    let id = created.id.clone().unwrap();
    assert_eq!(server.driver.read_blog(id).await.unwrap(), created);
    server.stop().await;
}

#[tokio::test]
async fn shutdown_interrupts_a_paced_stream() {
    let server = TestServer::start(StoreUri::Memory, Duration::from_secs(3600)).await;

    let driver = server.driver.clone();
    let call = tokio::spawn(async move { driver.decompose_factors(120).await });

    // Wait until the stream is admitted and parked in its pacing sleep.
    timeout(Duration::from_secs(5), async {
        while server.services.lifecycle().inflight() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream was never admitted");

    let started = std::time::Instant::now();
    server.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let err = timeout(Duration::from_secs(5), call)
        .await
        .expect("paced stream was not interrupted")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}
