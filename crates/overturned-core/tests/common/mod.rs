#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use overturned_core::{
    agent::ModelBackend,
    config::Config,
    dispatch::{Dispatcher, Profiles},
    types::{CitationSource, GenerateRequest, ModelReply},
};
use tokio::sync::Semaphore;

/// Backend that records every request and answers from a script.
pub struct ScriptedBackend {
    pub requests: Mutex<Vec<GenerateRequest>>,
    reply: Option<ModelReply>,
    gate: Option<Semaphore>,
    panic: bool,
}

impl ScriptedBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: Some(ModelReply {
                text: text.into(),
                sources: None,
            }),
            gate: None,
            panic: false,
        }
    }

    pub fn replying_with_sources(text: &str, sources: Vec<CitationSource>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: Some(ModelReply {
                text: text.into(),
                sources: Some(sources),
            }),
            gate: None,
            panic: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: None,
            gate: None,
            panic: false,
        }
    }

    /// Hold every call until `release` is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Panic inside `generate`, after recording the request.
    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> GenerateRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.panic {
            panic!("backend blew up");
        }
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => bail!("quota exceeded"),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn test_config() -> Config {
    Config::from_dotenv_str("API_KEY=test-key").unwrap()
}

pub fn dispatcher(backend: Arc<ScriptedBackend>) -> Dispatcher {
    Dispatcher::new(backend, Profiles::from_config(&test_config()))
}
