// Reads a slow byte stream to its end with a hand-written coroutine body.
//
// Every read is a begin/end style operation that completes on a background
// thread. The body waits on each read as a step, appends what it got, and
// produces the whole buffer once a read comes back empty. Resumptions are
// pinned to a single scheduler thread.
//
// Run with `RUST_LOG=corun=trace` to watch the driver and scheduler work.

use std::io;
use std::io::Cursor;
use std::io::Read;
use std::mem;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use corun::Advance;
use corun::AsyncCallback;
use corun::Body;
use corun::CoroutineState;
use corun::Return;
use corun::Scheduler;
use corun::Step;
use corun::Yield;
use corun::wrap_async;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CHUNK: usize = 16;

/// A stream that hands out at most `CHUNK` bytes per read, after a delay.
#[derive(Clone)]
struct SlowStream(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SlowStream {
    fn new(contents: &[u8]) -> Self {
        SlowStream(Arc::new(Mutex::new(Cursor::new(contents.to_vec()))))
    }

    fn begin_read(&self, callback: AsyncCallback<io::Result<Vec<u8>>>) {
        let stream = self.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(2));
            let mut chunk = vec![0; CHUNK];
            let read = stream
                .0
                .lock()
                .map_err(|_| io::Error::other("stream lock poisoned"))
                .and_then(|mut cursor| cursor.read(&mut chunk));
            callback(read.map(|n| {
                chunk.truncate(n);
                chunk
            }))
        });
    }
}

enum Stage {
    Reading,
    Waiting(CoroutineState<Vec<u8>>),
    Finished,
}

struct ReadToEnd {
    stream: SlowStream,
    buffer: Vec<u8>,
    stage: Stage,
}

impl Body<Vec<u8>> for ReadToEnd {
    fn resume(mut self) -> Advance<Vec<u8>, Self> {
        match mem::replace(&mut self.stage, Stage::Finished) {
            Stage::Reading => {
                let stream = self.stream.clone();
                let read = CoroutineState::new(wrap_async(
                    move |callback| stream.begin_read(callback),
                    |read: io::Result<Vec<u8>>| read,
                ));
                let step = Step::on(&read);
                self.stage = Stage::Waiting(read);
                Yield(step, self)
            }
            Stage::Waiting(read) => match read.result() {
                Ok(chunk) if chunk.is_empty() => {
                    info!(total = self.buffer.len(), "reached end of stream");
                    let buffer = mem::take(&mut self.buffer);
                    Yield(Step::Done(buffer), self)
                }
                Ok(chunk) => {
                    info!(len = chunk.len(), "read chunk");
                    self.buffer.extend_from_slice(&chunk);
                    self.stage = Stage::Reading;
                    Yield(Step::Continue, self)
                }
                Err(error) => Return(Err(error.into())),
            },
            Stage::Finished => Return(Ok(())),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let text = "It is a truth universally acknowledged, that a single \
                coroutine in possession of a good stream, must be in want \
                of a scheduler.";
    let body = ReadToEnd {
        stream: SlowStream::new(text.as_bytes()),
        buffer: Vec::new(),
        stage: Stage::Reading,
    };

    let scheduler = Scheduler::start_new()?;
    let contents = body.run(Some(scheduler.trampoline())).wait()?;
    scheduler.dispose();

    println!("read {} bytes", contents.len());
    println!("{}", String::from_utf8(contents)?);
    Ok(())
}
