mod helpers;

mod collections;
mod deployments;
mod groups;
mod protocol;
mod scenarios;
