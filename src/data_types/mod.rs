pub mod mensa_data_types;

use teloxide::utils::command::BotCommands;

use mensa_data_types::Meal;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "Mensa-Auswahl anzeigen")]
    Start,
    #[command(description = "Infos über diesen Bot")]
    About,
}

/// Restricts which meals get listed. Section headings always come from the
/// full plan, so a filtered message keeps the structure of the unfiltered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MealFilter {
    #[default]
    All,
    Vegetarian,
    Vegan,
}

impl MealFilter {
    pub fn matches(self, meal: &Meal) -> bool {
        match self {
            MealFilter::All => true,
            MealFilter::Vegetarian => meal.is_meatless(),
            MealFilter::Vegan => meal.is_vegan(),
        }
    }
}

/// Typed view of the `notifications` column:
/// 0 = no auto updates, -1 = delivery permanently failed, id > 0 = subscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    None,
    Failed,
    Subscribed(u32),
}

impl SubscriptionState {
    pub fn from_db(raw: i64) -> Self {
        match raw {
            0 => SubscriptionState::None,
            raw if raw < 0 => SubscriptionState::Failed,
            id => SubscriptionState::Subscribed(id as u32),
        }
    }

    pub fn to_db(self) -> i64 {
        match self {
            SubscriptionState::None => 0,
            SubscriptionState::Failed => -1,
            SubscriptionState::Subscribed(id) => i64::from(id),
        }
    }

    pub fn is_subscribed(self) -> bool {
        matches!(self, SubscriptionState::Subscribed(_))
    }
}
