//! Chunk-level draining of a child output stream

use super::line_buffer::LineReassembler;
use super::processor::LineConsumer;
use super::raw_log::RawLog;
use super::types::{DrainStats, ReassembledChunk, StreamSource};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes requested per read; output is handled as soon as any arrives
pub const READ_CHUNK_SIZE: usize = 8192;

/// Drain `stream` to EOF, writing stripped text to `raw_log` and handing each
/// complete line to `consumer`.
///
/// Returns the consumer together with drain totals. A read error ends the
/// drain like EOF does; whatever was buffered is still flushed as lines.
pub async fn drain_stream<R, C>(
    mut stream: R,
    source: StreamSource,
    raw_log: Option<RawLog>,
    mut consumer: C,
) -> (C, DrainStats)
where
    R: AsyncRead + Unpin + Send,
    C: LineConsumer,
{
    let mut reassembler = LineReassembler::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut stats = DrainStats::default();

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Read from {} failed, treating as end of stream: {}", source, e);
                break;
            }
        };

        stats.bytes += n as u64;
        stats.chunks += 1;
        let chunk = reassembler.push(&buf[..n]);
        deliver(chunk, source, raw_log.as_ref(), &mut consumer, &mut stats).await;
    }

    let tail = reassembler.finish();
    deliver(tail, source, raw_log.as_ref(), &mut consumer, &mut stats).await;
    consumer.on_close(source).await;

    tracing::debug!(
        "Drained {}: {} bytes in {} chunks, {} lines",
        source,
        stats.bytes,
        stats.chunks,
        stats.lines
    );
    (consumer, stats)
}

async fn deliver<C: LineConsumer>(
    chunk: ReassembledChunk,
    source: StreamSource,
    raw_log: Option<&RawLog>,
    consumer: &mut C,
    stats: &mut DrainStats,
) {
    if let Some(log) = raw_log {
        log.append(&chunk.text).await;
    }
    for line in chunk.lines {
        stats.lines += 1;
        consumer.consume_line(&line, source).await;
    }
}
