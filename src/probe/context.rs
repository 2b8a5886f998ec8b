//! Collaborators shared by every probe constructor

use crate::config::Config;
use crate::graph::{Graph, NodeId};
use std::sync::Arc;
use tracing::{Dispatch, Span};

/// Built once per agent startup and passed by reference to every
/// constructor. Handlers that need it later keep a clone; all members are
/// shared handles.
#[derive(Debug, Clone)]
pub struct Context {
    logger: Span,
    // Host subscriber. Extension modules carry their own copy of `tracing`
    // and install this one before running any of their code.
    dispatch: Dispatch,
    config: Arc<Config>,
    graph: Graph,
    root: NodeId,
}

impl Context {
    pub fn new(config: Arc<Config>, graph: Graph, root: NodeId) -> Self {
        let logger = tracing::info_span!("topology", host = %root);
        Self {
            logger,
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
            config,
            graph,
            root,
        }
    }

    pub fn with_logger(mut self, logger: Span) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &Span {
        &self.logger
    }

    /// Subscriber events from this context should reach.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }
}
