#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::Value;
use tradewinds::{
    broadcast::{Broadcaster, ConnectionId, Room},
    gateway::events::ServerEvent,
    models::{Account, AccountStatus},
    store::Store,
};
use uuid::Uuid;

pub async fn account(store: &Store, first_name: &str, status: AccountStatus) -> Account {
    let account = Account {
        id: Uuid::now_v7(),
        first_name: first_name.to_owned(),
        last_name: "Tester".to_owned(),
        profile_image: None,
        role: "user".to_owned(),
        status,
    };
    store.insert_account(&account).await.unwrap();
    account
}

pub async fn active(store: &Store, first_name: &str) -> Account {
    account(store, first_name, AccountStatus::Active).await
}

#[derive(Debug, Clone)]
pub struct Emitted {
    pub rooms: Vec<Room>,
    pub event: &'static str,
    pub data: Value,
    pub except: Option<ConnectionId>,
}

/// Keeps every emit instead of delivering it.
#[derive(Default)]
pub struct RecordingBroadcaster {
    emitted: Mutex<Vec<Emitted>>,
}

impl RecordingBroadcaster {
    pub fn take(&self) -> Vec<Emitted> {
        std::mem::take(&mut *self.emitted.lock().unwrap())
    }

    fn record(&self, rooms: Vec<Room>, event: &ServerEvent, except: Option<ConnectionId>) {
        let frame: Value = serde_json::from_str(event.frame().unwrap().as_str()).unwrap();
        self.emitted.lock().unwrap().push(Emitted {
            rooms,
            event: event.name(),
            data: frame["data"].clone(),
            except,
        });
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn emit(&self, rooms: &[Room], event: &ServerEvent, except: Option<ConnectionId>) {
        self.record(rooms.to_vec(), event, except);
    }

    fn emit_to_all(&self, event: &ServerEvent, except: Option<ConnectionId>) {
        self.record(Vec::new(), event, except);
    }
}
