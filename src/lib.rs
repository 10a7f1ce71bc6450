//! # Macrolog
//!
//! Core of a food-diary client: searches a scraped nutrition source,
//! normalizes messy per-portion stats into canonical per-unit nutrient
//! bases, scales them to user-chosen portions, and logs entries and
//! favorites against meal categories in a local relational store.
//!
//! The crate is presentation-free. The embedding application is the
//! composition root: it opens a [`db::Store`], builds a
//! [`remote::NutritionClient`], and wires them into a
//! [`search_session::SearchSession`], a [`diary::DiaryFeed`], and a
//! [`favorites::FavoritesFeed`], observing each through its watch channel.

pub mod config;
pub mod db;
pub mod diary;
pub mod errors;
pub mod extract;
pub mod favorites;
pub mod food_model;
pub mod html_scan;
pub mod remote;
pub mod search_session;
pub mod staging;
pub mod validate;
