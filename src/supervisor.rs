use crate::config::{ClientConfig, Credentials};
use crate::error::Error;
use crate::frame::OpCode;
use crate::pipeline::{Pipeline, RecordSet};
use crate::request::{build_login_frame, build_subscribe_frame, parse_gateway_url};
use crate::ring::{DedupRing, SpinLock};
use crate::websocket::WebSocket;
use log::{debug, info};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const MAX_WORKERS: usize = 10;

/// Only the first two workers are ever rotated by the watchdog, and only they
/// get a fine cap high enough to keep their connection through heavy
/// duplicate traffic. Later workers are meant to give up early and reconnect.
const ROTATED_WORKERS: usize = 2;
const FRONT_FINE_CAP: u64 = 1_000_000;
const BACK_FINE_CAP: u64 = 500;

/// Per-worker receive buffer. One extra byte on each side of a message is
/// kept free for brace splicing.
const RECEIVE_BUFFER_SIZE: usize = 1 << 20;

/// State shared across workers: the duplicate-suppression ring, and one raw
/// socket handle per worker for the watchdog to force-close.
struct Shared {
    ring: SpinLock<DedupRing>,
    sockets: [Mutex<Option<TcpStream>>; MAX_WORKERS],
}

struct WorkerContext {
    worker: usize,
    host: String,
    port: u16,
    path: String,
    use_mask: bool,
    wait_on_socket: bool,
    credentials: Credentials,
    subscribe_frame: String,
    fine_cap: u64,
    shared: Arc<Shared>,
    pipeline: Arc<Pipeline>,
}

/// Launches the worker threads and runs the watchdog on the calling thread.
/// Does not return in normal operation.
pub fn run(config: ClientConfig) -> Result<(), Error> {
    let (host, port, path) = parse_gateway_url(&config.gateway_url)?;
    let subscribe_frame = build_subscribe_frame(&config.channel, &config.inst_type, &config.inst_id);
    info!("subscribe message: {}", subscribe_frame);

    let workers = config.workers.clamp(1, MAX_WORKERS);
    let shared = Arc::new(Shared {
        ring: SpinLock::new(DedupRing::new()),
        sockets: std::array::from_fn(|_| Mutex::new(None)),
    });
    let pipeline = Arc::new(Pipeline::new(&config.credentials));

    for worker in 0..workers {
        // Staggered launch keeps the workers from racing the same connect
        // window right at startup.
        thread::sleep(Duration::from_millis(rand::random::<u64>() % 10_000));
        let context = WorkerContext {
            worker,
            host: host.clone(),
            port,
            path: path.clone(),
            use_mask: config.use_mask,
            wait_on_socket: config.wait_on_socket,
            credentials: config.credentials.clone(),
            subscribe_frame: subscribe_frame.clone(),
            fine_cap: if worker < ROTATED_WORKERS {
                FRONT_FINE_CAP
            } else {
                BACK_FINE_CAP
            },
            shared: Arc::clone(&shared),
            pipeline: Arc::clone(&pipeline),
        };
        thread::Builder::new()
            .name(format!("worker-{}", worker))
            .spawn(move || worker_loop(context))?;
    }

    watchdog(&shared, workers)
}

/// Periodically force-closes the socket of one of the first two workers so a
/// fresh TCP connect gets to race the stale one.
fn watchdog(shared: &Shared, workers: usize) -> ! {
    let rotated = workers.min(ROTATED_WORKERS);
    let mut next = 0usize;
    loop {
        thread::sleep(Duration::from_millis(20_000 + rand::random::<u64>() % 10_000));
        let slot = next % rotated;
        next = next.wrapping_add(1);
        if let Some(stream) = shared.sockets[slot].lock().unwrap().as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
            info!("watchdog rotated worker {}", slot);
        }
    }
}

fn worker_loop(context: WorkerContext) -> ! {
    let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE].into_boxed_slice();
    let mut records = RecordSet::new();
    let mut session = (context.worker + 1) * 10000;
    loop {
        thread::sleep(Duration::from_millis(rand::random::<u64>() % 1000));
        match run_session(&context, session, &mut buffer, &mut records) {
            Ok(()) => info!("{}\tfine cap exceeded, reconnecting", session),
            Err(err) => info!("{}\tsession ended: {}", session, err),
        }
        session += 1;
    }
}

/// One connection lifetime: connect, login, subscribe, then react to order
/// events until the socket dies or the fine cap trips.
fn run_session(
    context: &WorkerContext,
    session: usize,
    buffer: &mut [u8],
    records: &mut RecordSet,
) -> Result<(), Error> {
    let mut ws = WebSocket::connect(
        &context.host,
        context.port,
        &context.path,
        context.use_mask,
        context.wait_on_socket,
    )?;
    *context.shared.sockets[context.worker].lock().unwrap() = ws.try_clone_stream().ok();

    let login_frame = build_login_frame(&context.credentials, unix_timestamp());
    exchange(&mut ws, session, "login", &login_frame, buffer)?;
    exchange(&mut ws, session, "subscribe", &context.subscribe_frame, buffer)?;

    let mut fine: u64 = 0;
    loop {
        if fine > context.fine_cap {
            return Ok(());
        }
        let (begin, end) = match read_records(&mut ws, &context.pipeline, session, buffer, records)
        {
            Ok(range) => range,
            Err(Error::NoData) => continue,
            Err(err) => return Err(err),
        };
        let doc = &buffer[begin..end];
        for record in records.iter() {
            let order_id = record.order_id(doc);

            // Query and emission must be one atomic step against the other
            // workers, so the reply write happens under the ring lock.
            let mut ring = context.shared.ring.lock();
            let seen = ring.count(order_id);
            if seen > 0 {
                fine += (1u64 << (seen - 1).min(32)) - 1;
                continue;
            }
            let reply_written = {
                let output = ws.output_message();
                context.pipeline.write_reply(doc, record, output)
            };
            if !reply_written {
                debug!("{}\treply for order {} does not fit, dropped", session, order_id);
                continue;
            }
            ws.send_last_output_message(OpCode::Text)?;
            ring.register(order_id);
            debug!("{}\tsent reply for order {}", session, order_id);
        }
    }
}

/// Sends one templated frame and reads one reply, logging the round trip.
fn exchange(
    ws: &mut WebSocket,
    session: usize,
    step: &str,
    frame: &str,
    buffer: &mut [u8],
) -> Result<(), Error> {
    let output = ws.output_message();
    output.push_str(frame);
    let started = Instant::now();
    ws.send_last_output_message(OpCode::Text)?;
    let length = ws.get_message(&mut buffer[1..], false, false)?;
    info!(
        "{}\t{} reply in {:?}: {}",
        session,
        step,
        started.elapsed(),
        String::from_utf8_lossy(&buffer[1..1 + length]),
    );
    Ok(())
}

/// Reads messages until one parses into records, skipping empty and
/// malformed frames. Returns the normalized document range inside `buffer`.
pub(crate) fn read_records(
    ws: &mut WebSocket,
    pipeline: &Pipeline,
    session: usize,
    buffer: &mut [u8],
    records: &mut RecordSet,
) -> Result<(usize, usize), Error> {
    loop {
        // Payload starts at index 1: the reserve byte in front (and the
        // terminator slot behind) make room for brace splicing.
        let length = ws.get_message(&mut buffer[1..], true, false)?;
        if length == 0 {
            continue;
        }
        debug!("{}\tarrived: {}", session, String::from_utf8_lossy(&buffer[1..1 + length]));
        let mut begin = 1usize;
        let mut end = 1 + length;
        if buffer[begin] != b'{' {
            begin -= 1;
            buffer[begin] = b'{';
        }
        if buffer[end - 1] != b'}' {
            buffer[end] = b'}';
            end += 1;
        }
        if pipeline.extract(&buffer[begin..end], records).is_err() {
            debug!("{}\tskipping malformed frame", session);
            continue;
        }
        return Ok((begin, end));
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
