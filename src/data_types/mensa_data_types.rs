use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::MENSEN;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Beef,
    Pork,
    Veggy,
    Vegan,
    Fish,
}

impl Category {
    pub fn emoji(self) -> &'static str {
        match self {
            Category::Beef => "🐄",
            Category::Pork => "🐷",
            Category::Veggy => "🥕",
            Category::Vegan => "🥑",
            Category::Fish => "🐟",
        }
    }
}

/// One dish as parsed from the plan page. Immutable once built.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Meal {
    pub name: String,
    /// Section heading the meal is grouped under, e.g. "Tagesgericht 1".
    pub meal_type: String,
    pub categories: BTreeSet<Category>,
    pub allergens: BTreeSet<String>,
}

impl Meal {
    pub fn is_meatless(&self) -> bool {
        self.categories.contains(&Category::Veggy) || self.categories.contains(&Category::Vegan)
    }

    pub fn is_vegan(&self) -> bool {
        self.categories.contains(&Category::Vegan)
    }
}

/// A cafeteria's plan for one day, meals in document order. An empty meal
/// list means the cafeteria is closed that day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Menu {
    pub mensa_id: u32,
    pub mensa_name: String,
    /// Display date, `dd.mm.yyyy`.
    pub day: String,
    pub meals: Vec<Meal>,
}

impl Menu {
    pub fn new(mensa_id: u32, day: String) -> Self {
        Menu {
            mensa_id,
            mensa_name: MENSEN.get(&mensa_id).copied().unwrap_or("???").to_string(),
            day,
            meals: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.meals.is_empty()
    }

    pub fn filtered_meals(&self, filter: crate::data_types::MealFilter) -> Vec<&Meal> {
        self.meals.iter().filter(|m| filter.matches(m)).collect()
    }
}
