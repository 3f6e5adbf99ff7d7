use blockbridge::dispatch::Job;
use blockbridge::message::Inbound;
use blockbridge::{Adapter, Body, BoxError, Environ, Error, ScopeKind, StartResponse};
use std::io;

mod common;

#[async_std::test]
async fn handler_error() {
    let h = |_: &mut Environ, start: &mut StartResponse| -> Result<Body, BoxError> {
        start.start("200 OK", vec![("x-a", "b")], None);
        Err("database unavailable".into())
    };

    let (res, sent) = common::run(h, common::get("/"), common::chunks(&[])).await;

    match res {
        Err(Error::HandlerExecution(msg)) => assert_eq!(msg, "database unavailable"),
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn handler_panic() {
    let h = |_: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> {
        panic!("boom");
    };

    let (res, sent) = common::run(h, common::get("/"), common::chunks(&[])).await;

    match res {
        Err(Error::HandlerExecution(msg)) => assert!(msg.contains("boom"), "msg: {}", msg),
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn transport_error_while_reading() {
    let h = |env: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> {
        match env.input.read_all() {
            Err(Error::TransportRead(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::ConnectionReset);
                // reading again keeps failing.
                assert!(env.input.read_all().is_err());
                Err("aborted".into())
            }
            other => Ok(vec![other?]),
        }
    };

    let inbound = common::messages(vec![
        Ok(Inbound::chunk(&b"partial"[..], true)),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
    ]);

    let (res, sent) = common::run(h, common::post("/"), inbound).await;

    match res {
        Err(Error::TransportRead(e)) => {
            assert_eq!(e.kind(), io::ErrorKind::ConnectionReset);
            assert_eq!(e.to_string(), "reset by peer");
        }
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn swallowed_read_error_still_aborts() {
    let h = |env: &mut Environ, start: &mut StartResponse| -> Result<Body, BoxError> {
        let _ = env.input.read_all();
        start.start("200 OK", Vec::<(String, String)>::new(), None);
        Ok(vec![b"partial".to_vec()])
    };

    let inbound = common::messages(vec![
        Ok(Inbound::chunk(&b"abc"[..], true)),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
    ]);

    let (res, sent) = common::run(h, common::post("/"), inbound).await;

    match res {
        Err(Error::TransportRead(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn disconnect_while_reading() {
    let h = |env: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> {
        Ok(vec![env.input.read_all()?])
    };

    let inbound = common::messages(vec![
        Ok(Inbound::chunk(&b"abc"[..], true)),
        Ok(Inbound::Disconnect),
    ]);

    let (res, sent) = common::run(h, common::post("/"), inbound).await;

    match res {
        Err(Error::TransportRead(e)) => {
            assert_eq!(e.kind(), io::ErrorKind::ConnectionAborted);
            assert!(e.to_string().contains("disconnected"), "err: {}", e);
        }
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn malformed_status_emits_nothing() {
    let h = |_: &mut Environ, start: &mut StartResponse| -> Result<Body, BoxError> {
        start.start("OK 200", Vec::<(String, String)>::new(), None);
        Ok(vec![b"body".to_vec()])
    };

    let (res, sent) = common::run(h, common::get("/"), common::chunks(&[])).await;

    match res {
        Err(Error::MalformedStatus(s)) => assert_eq!(s, "OK 200"),
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn invalid_header_emits_nothing() {
    let h = |_: &mut Environ, start: &mut StartResponse| -> Result<Body, BoxError> {
        start.start("200 OK", vec![("bad header", "x")], None);
        Ok(vec![])
    };

    let (res, sent) = common::run(h, common::get("/"), common::chunks(&[])).await;

    assert!(matches!(res, Err(Error::Http(_))), "res: {:?}", res);
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn refused_dispatch() {
    common::setup_logger();

    let h = |_: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> { Ok(vec![]) };

    let refuse = |_job: Job| -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "no capacity"))
    };

    let adapter = Adapter::new(h, refuse);

    let mut inbound = common::chunks(&[]);
    let mut sent = common::Recorder::default();

    let res = adapter
        .call(&common::get("/"), &mut inbound, &mut sent)
        .await;

    match res {
        Err(Error::HandlerExecution(msg)) => assert!(msg.contains("no capacity"), "msg: {}", msg),
        r => panic!("Unexpected: {:?}", r),
    }
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn dropped_job() {
    common::setup_logger();

    let h = |_: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> { Ok(vec![]) };

    // accepts the job, but never runs it.
    let drop_it = |job: Job| -> io::Result<()> {
        drop(job);
        Ok(())
    };

    let adapter = Adapter::new(h, drop_it);

    let mut inbound = common::chunks(&[]);
    let mut sent = common::Recorder::default();

    let res = adapter
        .call(&common::get("/"), &mut inbound, &mut sent)
        .await;

    assert!(matches!(res, Err(Error::HandlerExecution(_))), "res: {:?}", res);
    assert!(sent.sent.is_empty());
}

#[async_std::test]
async fn transport_write_failure() {
    common::setup_logger();

    let h = |_: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> {
        Ok(vec![b"lost".to_vec()])
    };

    let adapter = Adapter::new(h, blockbridge::dispatch::ThreadPerRequest::new());

    let mut inbound = common::chunks(&[]);
    let mut sent = common::Recorder::failing();

    let res = adapter
        .call(&common::get("/"), &mut inbound, &mut sent)
        .await;

    assert!(matches!(res, Err(Error::TransportWrite(_))), "res: {:?}", res);
}

#[async_std::test]
async fn non_http_scope_is_ignored() -> Result<(), Error> {
    let h = |_: &mut Environ, _: &mut StartResponse| -> Result<Body, BoxError> {
        panic!("must not be called");
    };

    let scope = common::get("/").with_kind(ScopeKind::Other("websocket".into()));

    let (res, sent) = common::run(h, scope, common::chunks(&[])).await;
    res?;

    assert!(sent.sent.is_empty());

    Ok(())
}

#[test]
fn errors_display() {
    let e = Error::MalformedStatus("nope".into());
    assert_eq!(e.to_string(), "malformed status: \"nope\"");

    let e = Error::HandlerExecution("boom".into());
    assert_eq!(e.to_string(), "handler execution: boom");
}
