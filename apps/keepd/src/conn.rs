use std::net::SocketAddr;

use anyhow::Context;
use bytes::Bytes;
use keepcore::shard::{Outbound, SessionId, WorldReq};
use keepio::line::LineReader;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

const BANNER: &[u8] = b"keepmud\r\n";

/// One connection: ask for a name until the world accepts it, then forward each line as
/// a command. Output flows back through the writer task.
pub async fn handle_conn(
    stream: TcpStream,
    peer: SocketAddr,
    session: SessionId,
    world_tx: mpsc::Sender<WorldReq>,
) -> anyhow::Result<()> {
    info!(peer = %peer, session = %session, "connected");
    let (rd, mut wr) = stream.into_split();
    let mut lines = LineReader::new(rd);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
    let mut writer = tokio::spawn(async move {
        while let Some(m) = out_rx.recv().await {
            match m {
                Outbound::Text(b) => {
                    if wr.write_all(&b[..]).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = wr.shutdown().await;
    });

    let _ = out_tx.send(Outbound::Text(Bytes::from_static(BANNER)));
    let attached = loop {
        let _ = out_tx.send(Outbound::Text(Bytes::from_static(b"name: ")));
        let Some(name) = lines.read_command().await? else {
            break false;
        };
        if name.is_empty() {
            continue;
        }
        let (reply, reply_rx) = oneshot::channel();
        world_tx
            .send(WorldReq::Attach {
                session,
                name,
                out: out_tx.clone(),
                reply,
            })
            .await
            .context("world task is gone")?;
        match reply_rx.await.context("world dropped attach reply")? {
            Ok(()) => break true,
            Err(reason) => {
                let _ = out_tx.send(Outbound::Text(Bytes::from(format!("{reason}\r\n"))));
            }
        }
    };
    if !attached {
        writer.abort();
        info!(peer = %peer, session = %session, "disconnected before login");
        return Ok(());
    }
    // The world holds the session's sender from here on.
    drop(out_tx);

    let res: anyhow::Result<()> = loop {
        tokio::select! {
            line = lines.read_command() => match line {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    if world_tx.send(WorldReq::Input { session, line }).await.is_err() {
                        break Ok(());
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            },
            // Writer finishes on quit or when the socket stops taking writes.
            _ = &mut writer => {
                debug!(session = %session, "writer finished");
                break Ok(());
            }
        }
    };

    // Closes the session's output so anything still queued for it is skipped.
    writer.abort();
    let _ = world_tx.send(WorldReq::Detach { session }).await;
    info!(peer = %peer, session = %session, "disconnected");
    res
}
