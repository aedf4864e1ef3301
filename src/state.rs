use crate::db::{DbPool, OrmConn};
use crate::notify::Notifier;
use crate::payments::CardProcessor;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub payments: CardProcessor,
    pub notifier: Notifier,
}
