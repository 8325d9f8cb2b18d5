pub mod account;

pub mod backend;

pub mod capabilities;

pub mod cases;

pub mod config;

pub mod controller;

pub mod payments;

pub mod roulette;

pub mod seed;

pub mod services;

pub mod test_helpers;

pub use controller::{
    BalanceController,
    CaseController,
    ControllerError,
    Deposit,
    ItemOdds,
    Spin,
};
pub use services::AppServices;
