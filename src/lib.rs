//! School grade-management service: accounts, school structure, grade
//! entry, report cards and their bulk export, behind an axum HTTP surface.

pub mod accounts;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod grades;
pub mod pdf;
pub mod report;
pub mod school;
pub mod web;
