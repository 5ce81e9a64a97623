//! Thread-backed pool of tree-sitter C parsers
//!
//! Tree-sitter parsers are neither `Send` nor `Sync`, so each worker thread
//! owns one and requests travel over a channel. Any number of threads may
//! share a pool through `Clone`.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use tree_sitter::{Parser, Tree};

use crate::error::{FrontendError, Result};

/// Source text to parse.
#[derive(Debug)]
pub struct ParseRequest {
    pub content: String,
    pub path: PathBuf,
}

/// A parsed file. The tree borrows nothing; `content` is the text it was built from.
#[derive(Debug)]
pub struct ParseResult {
    pub tree: Tree,
    pub path: PathBuf,
    pub content: String,
}

struct WorkerRequest {
    request: ParseRequest,
    response_sender: Sender<Result<ParseResult>>,
}

#[derive(Clone)]
pub struct ParserPool {
    sender: Sender<WorkerRequest>,
}

impl ParserPool {
    /// Create a pool with `num_workers` parser threads.
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for i in 0..num_workers.max(1) {
            let receiver = receiver.clone();
            std::thread::spawn(move || Self::worker_thread(i, receiver));
        }

        Self { sender }
    }

    fn worker_thread(worker_id: usize, receiver: Arc<Mutex<Receiver<WorkerRequest>>>) {
        tracing::debug!("Parser worker {} started", worker_id);

        let mut parser = Parser::new();
        let language_error = parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .err()
            .map(|e| e.to_string());

        loop {
            let next = match receiver.lock() {
                Ok(receiver) => receiver.recv(),
                Err(_) => break,
            };
            let Ok(WorkerRequest { request, response_sender }) = next else {
                tracing::debug!("Parser worker {} shutting down", worker_id);
                break;
            };

            let result = match &language_error {
                Some(message) => Err(FrontendError::ParserPool(format!("failed to load the C grammar: {message}"))),
                None => match parser.parse(&request.content, None) {
                    Some(tree) => Ok(ParseResult {
                        tree,
                        path: request.path,
                        content: request.content,
                    }),
                    None => Err(FrontendError::Parse { path: request.path }),
                },
            };

            if response_sender.send(result).is_err() {
                tracing::warn!("Failed to send parse result back to caller");
            }
        }
    }

    /// Parse on a worker, blocking the calling thread until it is done.
    pub fn parse_blocking(&self, request: ParseRequest) -> Result<ParseResult> {
        let (response_sender, response_receiver) = channel();
        self.sender
            .send(WorkerRequest { request, response_sender })
            .map_err(|_| FrontendError::ParserPool("parser pool is shut down".to_string()))?;

        response_receiver
            .recv()
            .map_err(|_| FrontendError::ParserPool("parser worker died".to_string()))?
    }
}

/// Pool sized to the available parallelism, at least two workers.
pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);

    ParserPool::new(num_workers)
}
