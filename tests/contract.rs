//! End-to-end tests: a real server on an ephemeral port, a real client.

use std::net::SocketAddr;
use std::time::Duration;

use http::StatusCode;
use stella::contract::{AUTHORIZATION_HEADER, SAY, WELCOME, WELCOME_ANONYMOUS};
use stella::{
    ArgumentError, Client, ClientConfig, CodecError, EndpointDescriptor, Error, MediaType,
    Method, Request, Response, Router, Server, TransportError,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), Error>>,
}

async fn start(router: Router) -> Running {
    let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_with_shutdown(router, async {
        let _ = rx.await;
    }));
    Running { addr, shutdown, handle }
}

fn echo() -> Router {
    Router::new()
        .bind(&SAY, |user, args: Vec<String>| async move {
            format!("{user} just said {}", args[0])
        })
        .bind(&WELCOME, |user, _| async move { format!("Welcome {user}") })
        .bind(&WELCOME_ANONYMOUS, |_, _| async { "Are you a new member?" })
}

fn client(addr: SocketAddr) -> Client {
    Client::new(&ClientConfig::new(format!("http://{addr}"))).unwrap()
}

#[tokio::test]
async fn say_returns_identity_and_command() {
    let server = start(echo()).await;
    let client = client(server.addr);

    assert_eq!(client.say("Frederic", "hello").await.unwrap(), "Frederic just said hello");
    assert_eq!(
        client.invoke(&SAY, "Frederic", ["hello"]).await.unwrap(),
        "Frederic just said hello"
    );
}

#[tokio::test]
async fn say_carries_escaped_and_unicode_values() {
    let server = start(echo()).await;
    let client = client(server.addr);

    assert_eq!(
        client.say("Frédéric", "hello world/ü?#%").await.unwrap(),
        "Frédéric just said hello world/ü?#%"
    );

    // An empty command leaves `/say/`, which no route matches.
    let err = client.say("Frederic", "").await.unwrap_err();
    assert!(matches!(err, Error::Status { status: StatusCode::NOT_FOUND, .. }));
}

#[tokio::test]
async fn welcome_greets_identity() {
    let server = start(echo()).await;
    let client = client(server.addr);

    assert_eq!(client.welcome("frederic").await.unwrap(), "Welcome frederic");
}

#[tokio::test]
async fn welcome_anonymous_ignores_identity_header() {
    static ANONYMOUS_WITH_HEADER: EndpointDescriptor = EndpointDescriptor {
        name: "welcome-anonymous-with-header",
        method: Method::Get,
        path: "/welcome-anonymous",
        path_params: &[],
        identity_header: Some(AUTHORIZATION_HEADER),
    };

    let server = start(echo()).await;
    let client = client(server.addr);

    assert_eq!(client.welcome_anonymous().await.unwrap(), "Are you a new member?");
    assert_eq!(
        client.invoke(&ANONYMOUS_WITH_HEADER, "frederic", None::<String>).await.unwrap(),
        "Are you a new member?"
    );
}

#[tokio::test]
async fn missing_identity_header_is_refused() {
    // Same route as WELCOME, but this copy of the contract forgot the header.
    static WELCOME_WITHOUT_HEADER: EndpointDescriptor = EndpointDescriptor {
        name: "welcome-without-header",
        method: Method::Get,
        path: "/welcome",
        path_params: &[],
        identity_header: None,
    };

    let server = start(echo()).await;
    let err = client(server.addr)
        .invoke(&WELCOME_WITHOUT_HEADER, "frederic", None::<String>)
        .await
        .unwrap_err();

    match err {
        Error::Status { status, body, .. } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains(AUTHORIZATION_HEADER));
        }
        other => panic!("expected 401, got {other:?}"),
    }
}

#[tokio::test]
async fn unserved_operation_is_not_found() {
    static FAREWELL: EndpointDescriptor = EndpointDescriptor {
        name: "farewell",
        method: Method::Get,
        path: "/farewell",
        path_params: &[],
        identity_header: None,
    };

    let server = start(echo()).await;
    let err = client(server.addr).invoke(&FAREWELL, "", None::<String>).await.unwrap_err();
    assert!(matches!(err, Error::Status { status: StatusCode::NOT_FOUND, .. }));
}

#[tokio::test]
async fn handler_failure_is_a_server_error() {
    let router = Router::new().bind(&WELCOME, |_, _| async {
        Err::<String, _>(std::io::Error::other("no greeting today"))
    });
    let server = start(router).await;

    let err = client(server.addr).welcome("frederic").await.unwrap_err();
    assert!(matches!(err, Error::Status { status: StatusCode::INTERNAL_SERVER_ERROR, .. }));
}

#[tokio::test]
async fn handler_panic_is_a_server_error() {
    let router = Router::new().bind(&WELCOME, |user: String, _| async move {
        if user == "boom" {
            panic!("greeting exploded");
        }
        format!("Welcome {user}")
    });
    let server = start(router).await;
    let client = client(server.addr);

    let err = client.welcome("boom").await.unwrap_err();
    assert!(
        matches!(err, Error::Status { status: StatusCode::INTERNAL_SERVER_ERROR, .. }),
        "{err:?}"
    );
    assert!(err.user_message().starts_with("server refused the call"));

    assert_eq!(client.welcome("frederic").await.unwrap(), "Welcome frederic");
}

#[tokio::test]
async fn wrong_arity_never_reaches_the_server() {
    let server = start(echo()).await;
    let client = client(server.addr);

    let err = client.invoke(&SAY, "frederic", ["a", "b"]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Argument(ArgumentError::Arity { operation: "say", expected: 1, actual: 2 })
    ));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = Client::new(
        &ClientConfig::new(format!("http://{addr}")).with_timeout(Duration::from_secs(5)),
    )
    .unwrap();

    let err = client.say("Frederic", "hello").await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Connect(_))), "{err:?}");
    assert!(err.user_message().starts_with("network failure"));
}

#[tokio::test]
async fn invalid_utf8_reply_is_a_codec_error() {
    let raw = vec![b'W', 0xff, 0xfe, 0xfd];
    let body = raw.clone();
    let router = Router::new().on(Method::Get, "/welcome", move |_req: Request| {
        let body = body.clone();
        async move { Response::builder().bytes(MediaType::TEXT_PLAIN, body) }
    });
    let server = start(router).await;

    let err = client(server.addr).welcome("frederic").await.unwrap_err();
    let Error::Codec(codec) = &err else {
        panic!("expected a codec error, got {err:?}");
    };
    assert!(matches!(codec, CodecError::InvalidUtf8 { .. }));
    assert_eq!(codec.bytes().map(|b| b.to_vec()), Some(raw));
    assert!(err.user_message().starts_with("unexpected response"));
}

fn slow() -> Router {
    Router::new().bind(&WELCOME, |user, _| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        format!("Welcome {user}")
    })
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = start(slow()).await;
    let config = ClientConfig::new(format!("http://{}", server.addr))
        .with_timeout(Duration::from_millis(200));
    let client = Client::new(&config).unwrap();

    let err = client.welcome("frederic").await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Timeout(_))), "{err:?}");
}

#[tokio::test]
async fn aborted_call_is_cancelled() {
    let server = start(slow()).await;
    let client = client(server.addr);

    let pending = client.spawn_invoke(&WELCOME, "frederic", None::<String>);
    tokio::time::sleep(Duration::from_millis(50)).await;
    pending.abort();

    let err = pending.await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Cancelled)), "{err:?}");
}

#[tokio::test]
async fn concurrent_calls_are_independent() {
    let server = start(echo()).await;
    let client = client(server.addr);

    let pending: Vec<_> = (0..32)
        .map(|i| client.spawn_invoke(&SAY, format!("user{i}"), [format!("line {i}")]))
        .collect();

    for (i, call) in pending.into_iter().enumerate() {
        assert_eq!(call.await.unwrap(), format!("user{i} just said line {i}"));
    }
}

#[tokio::test]
async fn shutdown_returns_while_client_holds_idle_connection() {
    let server = start(echo()).await;
    let client = client(server.addr);
    assert_eq!(client.welcome("frederic").await.unwrap(), "Welcome frederic");

    // `client` stays alive, so its pool keeps the keep-alive connection open.
    server.shutdown.send(()).unwrap();
    let stopped = tokio::time::timeout(Duration::from_secs(3), server.handle).await;
    stopped.expect("server did not stop").unwrap().unwrap();

    drop(client);
}

#[tokio::test]
async fn shutdown_lets_in_flight_call_finish() {
    let router = Router::new().bind(&WELCOME, |user, _| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        format!("Welcome {user}")
    });
    let server = start(router).await;
    let client = client(server.addr);

    let pending = client.spawn_invoke(&WELCOME, "frederic", None::<String>);
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.shutdown.send(()).unwrap();

    assert_eq!(pending.await.unwrap(), "Welcome frederic");
    let stopped = tokio::time::timeout(Duration::from_secs(3), server.handle).await;
    stopped.expect("server did not stop").unwrap().unwrap();
}
