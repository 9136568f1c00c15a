mod aggregates;
mod conditions;
mod config;
mod errors;
mod results;
