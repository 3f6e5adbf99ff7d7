use blockbridge::dispatch::WorkerPool;
use blockbridge::message::{Inbound, Outbound};
use blockbridge::{Adapter, Addr, Body, BoxError, Environ, Error, RequestScope, StartResponse};
use futures_channel::mpsc;
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use std::io;

/// A blocking handler that echoes the request body in upper case.
fn shout(env: &mut Environ, start: &mut StartResponse) -> Result<Body, BoxError> {
    let mut out = vec![];

    loop {
        let line = env.input.read_line()?;
        if line.is_empty() {
            break;
        }
        out.push(line.to_ascii_uppercase());
    }

    let len: usize = out.iter().map(|l| l.len()).sum();

    start.start(
        "200 OK",
        vec![
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Content-Length".to_string(), len.to_string()),
        ],
        None,
    );

    Ok(out)
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let pool = WorkerPool::new(4).map_err(|e| Error::HandlerExecution(e.to_string()))?;
    let adapter = Adapter::new(shout, pool);

    let (in_tx, mut receive) = mpsc::unbounded::<io::Result<Inbound>>();
    let (out_tx, mut out_rx) = mpsc::unbounded::<Outbound>();
    let mut send = out_tx.sink_map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e));

    // The transport side: body arrives in pieces, from another task.
    async_std::task::spawn(async move {
        for part in &["hello ", "from the\n", "async ", "side\n"] {
            in_tx
                .unbounded_send(Ok(Inbound::chunk(part.as_bytes(), true)))
                .ok();
            async_std::task::sleep(std::time::Duration::from_millis(10)).await;
        }
        in_tx.unbounded_send(Ok(Inbound::chunk(vec![], false))).ok();
    });

    let scope = RequestScope::new(http::Method::POST, "/shout")
        .with_header("content-type", "text/plain")
        .with_client(Addr::new("127.0.0.1", 50000));

    adapter.call(&scope, &mut receive, &mut send).await?;

    drop(send);

    while let Some(msg) = out_rx.next().await {
        match msg {
            Outbound::Start(start) => println!("{:?}", start.to_response()),
            Outbound::Body(body) => println!("{}", String::from_utf8_lossy(&body.body)),
        }
    }

    Ok(())
}
