pub mod audit;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod models;
pub mod notify;
pub mod payments;
pub mod pricing;
pub mod response;
pub mod routes;
pub mod schedule;
pub mod state;

pub mod dto {
    pub mod cart;
    pub mod checkout;
    pub mod orders;
    pub mod payouts;
}

pub mod middleware {
    pub mod auth;
}

pub mod services {
    pub mod cart_service;
    pub mod checkout_service;
    pub mod coupon_service;
    pub mod order_service;
    pub mod payout_service;
}
