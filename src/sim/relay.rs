//! Spawn relay
//!
//! Spawners hold a cloneable [`SpawnRelay`] instead of a reference to the
//! server. Requests queue on a channel and the server drains them at the
//! start of every tick, in the order they were sent.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec2;

use super::bullet::{BulletStyle, CustomData};
use super::path::BulletPath;
use super::server::VolleyShot;

#[derive(Debug, Clone)]
pub enum SpawnRequest {
    Bullet {
        origin: Vec2,
        path: Arc<BulletPath>,
        style: Option<Arc<BulletStyle>>,
        custom_data: CustomData,
    },
    Volley {
        origin: Vec2,
        shots: Vec<VolleyShot>,
        style: Option<Arc<BulletStyle>>,
        custom_data: CustomData,
    },
}

/// Producer side of the spawn channel
#[derive(Debug, Clone)]
pub struct SpawnRelay {
    sender: Sender<SpawnRequest>,
}

impl SpawnRelay {
    /// Queue one bullet. Returns false if the server is gone.
    pub fn spawn_bullet(
        &self,
        origin: Vec2,
        path: Arc<BulletPath>,
        style: Option<Arc<BulletStyle>>,
        custom_data: CustomData,
    ) -> bool {
        self.send(SpawnRequest::Bullet {
            origin,
            path,
            style,
            custom_data,
        })
    }

    /// Queue a volley. Returns false if the server is gone.
    pub fn spawn_volley(
        &self,
        origin: Vec2,
        shots: Vec<VolleyShot>,
        style: Option<Arc<BulletStyle>>,
        custom_data: CustomData,
    ) -> bool {
        self.send(SpawnRequest::Volley {
            origin,
            shots,
            style,
            custom_data,
        })
    }

    pub fn send(&self, request: SpawnRequest) -> bool {
        match self.sender.send(request) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Spawn relay disconnected; request dropped");
                false
            }
        }
    }
}

/// Consumer side, owned by the server
#[derive(Debug)]
pub(crate) struct SpawnInbox {
    sender: Sender<SpawnRequest>,
    receiver: Receiver<SpawnRequest>,
}

impl SpawnInbox {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub(crate) fn relay(&self) -> SpawnRelay {
        SpawnRelay {
            sender: self.sender.clone(),
        }
    }

    /// Next pending request, without blocking
    pub(crate) fn try_next(&self) -> Option<SpawnRequest> {
        // The inbox keeps a sender alive, so this never disconnects
        self.receiver.try_recv().ok()
    }
}
