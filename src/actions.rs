//! Messages exchanged between the UI loop and the fetch dispatcher
use crate::api::{ChatRequest, ChatResult};
use crate::error::Outcome;
use crate::route::{RouteRequest, RouteResult};

pub type RequestId = u64;

// Requests from UI/controller to the dispatcher
#[derive(Debug, Clone)]
pub enum Request {
    PlanRoute { id: RequestId, request: RouteRequest },
    Chat { id: RequestId, request: ChatRequest },
    Cancel { id: RequestId },
}

// Responses from the dispatcher back to UI/controller. Exactly one per PlanRoute/Chat.
#[derive(Debug)]
pub enum Response {
    RouteFinished { id: RequestId, outcome: Outcome<RouteResult> },
    ChatFinished { id: RequestId, outcome: Outcome<ChatResult> },
}

impl Response {
    pub fn id(&self) -> RequestId {
        match self {
            Response::RouteFinished { id, .. } | Response::ChatFinished { id, .. } => *id,
        }
    }
}
