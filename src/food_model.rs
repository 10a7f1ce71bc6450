//! # Food Model Module
//!
//! Canonical data model for scraped food products, including the portion
//! normalizer that turns inconsistent "per portion" stats into per-unit
//! nutrient bases.
//!
//! ## Features
//!
//! - Raw (as-scraped) and canonical (normalized) food representations
//! - Regex-based detection of `<digits>g` / `<digits>ml` portion labels
//! - Synthesis of per-1g / per-1ml bases from labeled portions
//! - Sentinel-aware arithmetic: "unavailable" values stay unavailable

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Numeric placeholder for a nutrient field that could not be extracted.
///
/// Distinct from a true zero; arithmetic on records must propagate it
/// unchanged instead of scaling or dividing it.
pub const UNAVAILABLE: f32 = -1.0;

/// Title used when a scraped entry carries no readable name.
pub const MISSING_TITLE: &str = "Missing Entry";

lazy_static! {
    // Leading digit run immediately followed by a gram/millilitre token,
    // matched against the lowercased portion label. First match wins.
    static ref UNIT_BASIS_RE: Regex =
        Regex::new(r"(\d+)(g|ml)").expect("unit basis pattern should be valid");
}

/// One labeled portion exactly as written on the source, totals not yet
/// divided down to a per-unit basis.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPortion {
    pub label: String,
    pub kcal: f32,
    pub protein: f32,
    pub carbs: f32,
    pub fat: f32,
}

impl RawPortion {
    /// A portion whose every numeric field is unavailable.
    pub fn unavailable(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kcal: UNAVAILABLE,
            protein: UNAVAILABLE,
            carbs: UNAVAILABLE,
            fat: UNAVAILABLE,
        }
    }
}

/// A scraped food product before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFood {
    pub title: String,
    pub image_ref: Option<String>,
    pub portions: Vec<RawPortion>,
}

impl RawFood {
    /// Normalize the raw portions into a canonical [`FoodRecord`].
    ///
    /// All raw portions are kept verbatim (source order), then for each
    /// portion whose label contains a `digits+('g'|'ml')` run a per-unit
    /// basis is synthesized: the canonical name is the matched unit token
    /// and the nutrient values are the portion's values divided by the
    /// leading digit run. The first portion to produce a given canonical
    /// name wins; later matches for the same name are ignored. A zero scale
    /// factor (a literal `"0g"` label) synthesizes nothing.
    ///
    /// Running normalization on an already-normalized record adds no
    /// further units, because the canonical names are already present.
    pub fn normalize(&self) -> FoodRecord {
        let mut units: Vec<UnitBasis> = self
            .portions
            .iter()
            .map(|p| UnitBasis {
                label: p.label.clone(),
                kcal: p.kcal,
                protein: p.protein,
                carbs: p.carbs,
                fat: p.fat,
            })
            .collect();

        for portion in &self.portions {
            let label = portion.label.to_lowercase();
            let caps = match UNIT_BASIS_RE.captures(&label) {
                Some(caps) => caps,
                None => continue,
            };

            let scale: f32 = match caps[1].parse::<u32>() {
                Ok(0) | Err(_) => {
                    debug!("skipping unusable scale factor in label '{}'", portion.label);
                    continue;
                }
                Ok(n) => n as f32,
            };
            let name = &caps[2];

            if units.iter().any(|u| u.label == name) {
                continue;
            }

            units.push(UnitBasis {
                label: name.to_string(),
                kcal: per_unit(portion.kcal, scale),
                protein: per_unit(portion.protein, scale),
                carbs: per_unit(portion.carbs, scale),
                fat: per_unit(portion.fat, scale),
            });
        }

        FoodRecord {
            title: self.title.clone(),
            image_ref: self.image_ref.clone(),
            units,
        }
    }
}

// Sentinel-aware division: "unavailable" never turns into a small negative.
fn per_unit(value: f32, scale: f32) -> f32 {
    if value == UNAVAILABLE {
        UNAVAILABLE
    } else {
        value / scale
    }
}

/// A named nutrient basis, values per one unit of the basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitBasis {
    pub label: String,
    pub kcal: f32,
    pub protein: f32,
    pub carbs: f32,
    pub fat: f32,
}

impl UnitBasis {
    /// Scale the basis to a quantity, producing the display vector
    /// `[kcal, protein, carbs, fat]`.
    ///
    /// Scaling is plain multiplication, except that a sentinel component
    /// stays [`UNAVAILABLE`] for every quantity.
    pub fn scaled(&self, quantity: f32) -> Vec<f32> {
        [self.kcal, self.protein, self.carbs, self.fat]
            .iter()
            .map(|&v| if v == UNAVAILABLE { UNAVAILABLE } else { v * quantity })
            .collect()
    }
}

/// Canonical food record: unique unit labels, values per single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodRecord {
    pub title: String,
    /// Trailing path segment of the product image, `None` when the entry
    /// had no image.
    pub image_ref: Option<String>,
    pub units: Vec<UnitBasis>,
}

impl FoodRecord {
    /// A record with zero units carries nothing worth displaying or
    /// logging and is discarded upstream.
    pub fn is_usable(&self) -> bool {
        !self.units.is_empty()
    }
}

/// One page of normalized search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub query: String,
    pub page_index: u32,
    pub items: Vec<FoodRecord>,
    pub has_next_page: bool,
}

/// Fixed meal categories partitioning a day's log and the favorites view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
    SweetSnacks,
    SavorySnacks,
    Drinks,
}

impl MealCategory {
    pub const ALL: [MealCategory; 6] = [
        MealCategory::Breakfast,
        MealCategory::Lunch,
        MealCategory::Dinner,
        MealCategory::SweetSnacks,
        MealCategory::SavorySnacks,
        MealCategory::Drinks,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            MealCategory::Breakfast => "Breakfast",
            MealCategory::Lunch => "Lunch",
            MealCategory::Dinner => "Dinner",
            MealCategory::SweetSnacks => "Sweet Snacks",
            MealCategory::SavorySnacks => "Savory Snacks",
            MealCategory::Drinks => "Drinks",
        }
    }

    /// Stable identifier used for the TEXT column in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            MealCategory::Breakfast => "BREAKFAST",
            MealCategory::Lunch => "LUNCH",
            MealCategory::Dinner => "DINNER",
            MealCategory::SweetSnacks => "SWEET_SNACKS",
            MealCategory::SavorySnacks => "SAVORY_SNACKS",
            MealCategory::Drinks => "DRINKS",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "BREAKFAST" => Some(MealCategory::Breakfast),
            "LUNCH" => Some(MealCategory::Lunch),
            "DINNER" => Some(MealCategory::Dinner),
            "SWEET_SNACKS" => Some(MealCategory::SweetSnacks),
            "SAVORY_SNACKS" => Some(MealCategory::SavorySnacks),
            "DRINKS" => Some(MealCategory::Drinks),
            _ => None,
        }
    }
}

impl std::fmt::Display for MealCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portion(label: &str, kcal: f32) -> RawPortion {
        RawPortion {
            label: label.to_string(),
            kcal,
            protein: kcal / 10.0,
            carbs: kcal / 5.0,
            fat: kcal / 20.0,
        }
    }

    fn raw(portions: Vec<RawPortion>) -> RawFood {
        RawFood {
            title: "Oat Milk".to_string(),
            image_ref: Some("12345.jpg".to_string()),
            portions,
        }
    }

    #[test]
    fn test_normalize_synthesizes_per_unit_basis() {
        let food = raw(vec![portion("100ml", 50.0)]);
        let record = food.normalize();

        assert_eq!(record.units.len(), 2);
        assert_eq!(record.units[0].label, "100ml");
        assert_eq!(record.units[1].label, "ml");
        assert_eq!(record.units[1].kcal, 0.5);
        assert_eq!(record.units[1].protein, 0.05);
    }

    #[test]
    fn test_first_matching_portion_wins_per_canonical_name() {
        let food = raw(vec![
            portion("40ml for Tea/Coffee", 20.0),
            portion("100ml", 50.0),
            portion("125ml for Cereal", 63.0),
        ]);
        let record = food.normalize();

        // Three originals plus a single synthesized "ml" basis.
        assert_eq!(record.units.len(), 4);
        assert_eq!(record.units[0].label, "40ml for Tea/Coffee");
        assert_eq!(record.units[1].label, "100ml");
        assert_eq!(record.units[2].label, "125ml for Cereal");
        assert_eq!(record.units[3].label, "ml");
        // Synthesized from the first "ml" match in source order: 20 / 40.
        assert_eq!(record.units[3].kcal, 0.5);
    }

    #[test]
    fn test_grams_and_millilitres_synthesize_independently() {
        let food = raw(vec![portion("100g Bar", 400.0), portion("250ml Shake", 150.0)]);
        let record = food.normalize();

        let labels: Vec<&str> = record.units.iter().map(|u| u.label.as_str()).collect();
        assert_eq!(labels, vec!["100g Bar", "250ml Shake", "g", "ml"]);
        assert_eq!(record.units[2].kcal, 4.0);
        assert_eq!(record.units[3].kcal, 0.6);
    }

    #[test]
    fn test_case_insensitive_label_match() {
        let food = raw(vec![portion("Per 100G Serving", 287.0)]);
        let record = food.normalize();

        assert_eq!(record.units.len(), 2);
        assert_eq!(record.units[1].label, "g");
        assert_eq!(record.units[1].kcal, 2.87);
    }

    #[test]
    fn test_non_matching_labels_stay_raw_only() {
        let food = raw(vec![portion("1 Slice", 95.0), portion("Serving", 120.0)]);
        let record = food.normalize();

        assert_eq!(record.units.len(), 2);
        assert!(record.units.iter().all(|u| u.label != "g" && u.label != "ml"));
    }

    #[test]
    fn test_zero_scale_factor_synthesizes_nothing() {
        let food = raw(vec![portion("0g", 100.0)]);
        let record = food.normalize();

        assert_eq!(record.units.len(), 1);
        assert_eq!(record.units[0].label, "0g");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let food = raw(vec![portion("40ml", 20.0), portion("100g", 350.0)]);
        let once = food.normalize();

        let again = RawFood {
            title: once.title.clone(),
            image_ref: once.image_ref.clone(),
            portions: once
                .units
                .iter()
                .map(|u| RawPortion {
                    label: u.label.clone(),
                    kcal: u.kcal,
                    protein: u.protein,
                    carbs: u.carbs,
                    fat: u.fat,
                })
                .collect(),
        }
        .normalize();

        assert_eq!(once.units, again.units);
    }

    #[test]
    fn test_sentinel_survives_per_unit_division() {
        let food = raw(vec![RawPortion {
            label: "100g".to_string(),
            kcal: 287.0,
            protein: UNAVAILABLE,
            carbs: UNAVAILABLE,
            fat: UNAVAILABLE,
        }]);
        let record = food.normalize();

        let basis = &record.units[1];
        assert_eq!(basis.kcal, 2.87);
        assert_eq!(basis.protein, UNAVAILABLE);
        assert_eq!(basis.carbs, UNAVAILABLE);
        assert_eq!(basis.fat, UNAVAILABLE);
    }

    #[test]
    fn test_scaled_is_pure_multiplication() {
        let basis = UnitBasis {
            label: "g".to_string(),
            kcal: 2.0,
            protein: 0.5,
            carbs: 1.0,
            fat: 0.25,
        };

        assert_eq!(basis.scaled(1.0), vec![2.0, 0.5, 1.0, 0.25]);
        assert_eq!(basis.scaled(150.0), vec![300.0, 75.0, 150.0, 37.5]);
    }

    #[test]
    fn test_scaled_propagates_sentinel() {
        let basis = UnitBasis {
            label: "Serving".to_string(),
            kcal: 287.0,
            protein: UNAVAILABLE,
            carbs: UNAVAILABLE,
            fat: UNAVAILABLE,
        };

        let stats = basis.scaled(2.5);
        assert_eq!(stats, vec![717.5, UNAVAILABLE, UNAVAILABLE, UNAVAILABLE]);
    }

    #[test]
    fn test_usability() {
        let empty = FoodRecord {
            title: MISSING_TITLE.to_string(),
            image_ref: None,
            units: vec![],
        };
        assert!(!empty.is_usable());
        assert!(raw(vec![portion("100g", 1.0)]).normalize().is_usable());
    }

    #[test]
    fn test_meal_category_round_trip() {
        for category in MealCategory::ALL {
            assert_eq!(MealCategory::from_str_opt(category.as_str()), Some(category));
            assert!(!category.display_name().is_empty());
        }
        assert_eq!(MealCategory::from_str_opt("ELEVENSES"), None);
    }
}
