use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use selectors::attr::CaseSensitivity;
use teloxide::utils::markdown;

use crate::constants::NO_FILTER_MATCH_MSG;
use crate::data_backend::escape_markdown_v2;
use crate::data_types::mensa_data_types::{Category, Meal, Menu};
use crate::data_types::MealFilter;

/// Extracts the day's meals from a plan page. Malformed or incomplete meal
/// entries are skipped, never fatal; a page without a meal list yields an
/// empty menu, which is how closed days look upstream.
pub fn parse_menu(html: &str, mensa_id: u32, day: NaiveDate) -> Menu {
    let document = Html::parse_document(html);
    let mut menu = Menu::new(mensa_id, day.format("%d.%m.%Y").to_string());

    let item_sel = Selector::parse(".c-schedule__list-item").unwrap();
    let type_sel = Selector::parse(".stwm-artname").unwrap();
    let name_sel = Selector::parse(".js-schedule-dish-description").unwrap();
    let icon_sel = Selector::parse(".c-schedule__icon span").unwrap();
    let meat_sel = Selector::parse(".c-schedule__marker--type .u-text-sup").unwrap();
    let allergen_sel = Selector::parse(".c-schedule__marker--allergen .u-text-sup").unwrap();

    // section labels only appear on the first dish of a section and carry
    // over to the following dishes
    let mut last_type = String::new();

    for meal_tag in document.select(&item_sel) {
        let meal_type = match meal_tag.select(&type_sel).next().map(element_text) {
            Some(label) if !label.is_empty() => label,
            _ => last_type.clone(),
        };
        last_type.clone_from(&meal_type);

        let Some(name) = meal_tag.select(&name_sel).next().and_then(first_own_text) else {
            log::debug!("Gericht ohne Namen übersprungen (Mensa {})", mensa_id);
            continue;
        };

        let mut meal = Meal {
            name,
            meal_type,
            categories: Default::default(),
            allergens: Default::default(),
        };

        if let Some(icon) = meal_tag.select(&icon_sel).next() {
            if icon
                .value()
                .has_class("vegan", CaseSensitivity::CaseSensitive)
            {
                meal.categories.insert(Category::Vegan);
            }
            if icon
                .value()
                .has_class("fleischlos", CaseSensitivity::CaseSensitive)
            {
                meal.categories.insert(Category::Veggy);
            }
        }

        if let Some(marker) = meal_tag.select(&meat_sel).next() {
            let marker = element_text(marker);
            if marker.contains('S') {
                meal.categories.insert(Category::Pork);
            }
            if marker.contains('R') {
                meal.categories.insert(Category::Beef);
            }
        }

        if let Some(codes) = meal_tag.select(&allergen_sel).next() {
            let codes = element_text(codes);
            for code in codes
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
            {
                let code = code.trim();
                if !code.is_empty() {
                    meal.allergens.insert(code.to_string());
                }
            }

            // the fish marker on the salad bar is misleading, skip it there
            if meal.allergens.contains("Fi") && !meal.name.contains("Salatbar") {
                meal.categories.insert(Category::Fish);
            }
        }

        menu.meals.push(meal);
    }

    menu
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// First non-empty text node directly below the element. The dish name sits
/// there, before the nested marker elements.
fn first_own_text(el: ElementRef) -> Option<String> {
    el.children().find_map(|node| {
        node.value()
            .as_text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Renders the menu for telegram, MarkdownV2-escaped. Consecutive meals with
/// the same section label share one bolded heading; the filter drops meal
/// lines but leaves the headings of the full plan in place.
pub fn build_menu_message(menu: &Menu, filter: MealFilter) -> String {
    if menu.is_closed() {
        return escape_markdown_v2(&format!(
            "{} ist am {} geschlossen",
            menu.mensa_name, menu.day
        ));
    }

    if menu.filtered_meals(filter).is_empty() {
        return escape_markdown_v2(NO_FILTER_MATCH_MSG);
    }

    let mut msg = format!(
        "{} am {}\n",
        markdown::bold(&menu.mensa_name),
        markdown::bold(&menu.day)
    );

    let mut last_type: Option<&str> = None;
    for meal in &menu.meals {
        if last_type != Some(meal.meal_type.as_str()) {
            msg += &format!("\n{}:", markdown::bold(&meal.meal_type));
            last_type = Some(meal.meal_type.as_str());
        }

        if !filter.matches(meal) {
            continue;
        }

        msg += &format!("\n{}", meal.name);
        if !meal.categories.is_empty() {
            msg.push(' ');
            msg.extend(meal.categories.iter().map(|c| c.emoji()));
        }
    }

    match filter {
        MealFilter::All => {
            msg += "\n\n🥑 = vegan, 🥕 = vegetarisch";
            msg += "\n🐷 = Schwein, 🐄 = Rind, 🐟 = Fisch";
        }
        MealFilter::Vegetarian => msg += "\n\n🥑 = vegan, 🥕 = vegetarisch",
        MealFilter::Vegan => {}
    }

    escape_markdown_v2(&msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    const PLAN_FIXTURE: &str = r#"
        <div class="c-schedule">
          <ul class="c-schedule__list">
            <li class="c-schedule__list-item">
              <span class="stwm-artname">Tagesgericht 1</span>
              <p class="js-schedule-dish-description">
                Rindergulasch mit Spätzle
                <span class="c-schedule__marker--type"><sup class="u-text-sup">R</sup></span>
                <span class="c-schedule__marker--allergen"><sup class="u-text-sup">[Gl,Sl]</sup></span>
              </p>
            </li>
            <li class="c-schedule__list-item">
              <p class="js-schedule-dish-description">
                Gemüsecurry
                <span class="c-schedule__marker--allergen"><sup class="u-text-sup">[So]</sup></span>
              </p>
              <span class="c-schedule__icon"><span class="vegan"></span></span>
            </li>
            <li class="c-schedule__list-item">
              <span class="stwm-artname">Beilagen</span>
              <p class="js-schedule-dish-description">
                Schupfnudeln mit Speck
                <span class="c-schedule__marker--type"><sup class="u-text-sup">S</sup></span>
              </p>
            </li>
          </ul>
        </div>"#;

    #[test]
    fn parses_meals_in_document_order() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());

        assert_eq!(menu.mensa_name, "Mensa Arcisstr.");
        assert_eq!(menu.day, "07.08.2026");
        assert_eq!(menu.meals.len(), 3);
        assert_eq!(menu.meals[0].name, "Rindergulasch mit Spätzle");
        assert_eq!(menu.meals[1].name, "Gemüsecurry");
        assert_eq!(menu.meals[2].name, "Schupfnudeln mit Speck");
        assert!(!menu.is_closed());
    }

    #[test]
    fn missing_section_label_inherits_previous() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());

        assert_eq!(menu.meals[0].meal_type, "Tagesgericht 1");
        assert_eq!(menu.meals[1].meal_type, "Tagesgericht 1");
        assert_eq!(menu.meals[2].meal_type, "Beilagen");
    }

    #[test]
    fn markers_and_icons_become_categories() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());

        assert!(menu.meals[0].categories.contains(&Category::Beef));
        assert!(menu.meals[1].categories.contains(&Category::Vegan));
        assert!(menu.meals[1].is_vegan());
        assert!(menu.meals[2].categories.contains(&Category::Pork));
    }

    #[test]
    fn allergen_codes_are_split_and_trimmed() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());

        assert!(menu.meals[0].allergens.contains("Gl"));
        assert!(menu.meals[0].allergens.contains("Sl"));
        assert!(menu.meals[1].allergens.contains("So"));
    }

    #[test]
    fn fish_code_tags_fish_except_on_salad_bar() {
        let html = r#"
            <ul class="c-schedule__list">
              <li class="c-schedule__list-item">
                <span class="stwm-artname">Fisch</span>
                <p class="js-schedule-dish-description">
                  Fischfilet
                  <span class="c-schedule__marker--allergen"><sup class="u-text-sup">[Fi]</sup></span>
                </p>
              </li>
              <li class="c-schedule__list-item">
                <span class="stwm-artname">Salat</span>
                <p class="js-schedule-dish-description">
                  Salatbar
                  <span class="c-schedule__marker--allergen"><sup class="u-text-sup">[Fi]</sup></span>
                </p>
              </li>
            </ul>"#;
        let menu = parse_menu(html, 411, day());

        assert!(menu.meals[0].categories.contains(&Category::Fish));
        assert!(menu.meals[1].allergens.contains("Fi"));
        assert!(!menu.meals[1].categories.contains(&Category::Fish));
    }

    #[test]
    fn meal_without_name_is_skipped() {
        let html = r#"
            <ul class="c-schedule__list">
              <li class="c-schedule__list-item">
                <span class="stwm-artname">Tagesgericht 1</span>
              </li>
              <li class="c-schedule__list-item">
                <p class="js-schedule-dish-description">Kartoffelsuppe</p>
              </li>
            </ul>"#;
        let menu = parse_menu(html, 422, day());

        assert_eq!(menu.meals.len(), 1);
        assert_eq!(menu.meals[0].name, "Kartoffelsuppe");
        // the label of the skipped entry still carries over
        assert_eq!(menu.meals[0].meal_type, "Tagesgericht 1");
    }

    #[test]
    fn page_without_meal_list_is_closed() {
        let menu = parse_menu("<html><body><h1>Speiseplan</h1></body></html>", 423, day());
        assert!(menu.is_closed());
    }

    #[test]
    fn closed_menu_renders_fixed_sentence_for_every_filter() {
        let menu = Menu::new(421, "07.08.2026".to_string());
        let expected = "Mensa Arcisstr\\. ist am 07\\.08\\.2026 geschlossen";

        for filter in [MealFilter::All, MealFilter::Vegetarian, MealFilter::Vegan] {
            assert_eq!(build_menu_message(&menu, filter), expected);
        }
    }

    #[test]
    fn grouping_emits_one_heading_per_section() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());
        let msg = build_menu_message(&menu, MealFilter::All);

        assert_eq!(msg.matches("*Tagesgericht 1*:").count(), 1);
        assert_eq!(msg.matches("*Beilagen*:").count(), 1);
        assert!(msg.contains("Rindergulasch mit Spätzle 🐄"));
        assert!(msg.contains("Gemüsecurry 🥑"));
    }

    #[test]
    fn filter_drops_meal_lines_but_keeps_headings() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());
        let msg = build_menu_message(&menu, MealFilter::Vegan);

        assert!(msg.contains("Gemüsecurry 🥑"));
        assert!(!msg.contains("Rindergulasch"));
        assert!(!msg.contains("Schupfnudeln"));
        // headings still reflect the full plan
        assert!(msg.contains("*Tagesgericht 1*:"));
        assert!(msg.contains("*Beilagen*:"));
    }

    #[test]
    fn empty_filter_result_renders_fixed_sentence() {
        let html = r#"
            <ul class="c-schedule__list">
              <li class="c-schedule__list-item">
                <span class="stwm-artname">Tagesgericht 1</span>
                <p class="js-schedule-dish-description">
                  Schweinebraten
                  <span class="c-schedule__marker--type"><sup class="u-text-sup">S</sup></span>
                </p>
              </li>
            </ul>"#;
        let menu = parse_menu(html, 421, day());

        let msg = build_menu_message(&menu, MealFilter::Vegan);
        assert_eq!(msg, escape_markdown_v2(NO_FILTER_MATCH_MSG));
    }

    #[test]
    fn legend_depends_on_filter() {
        let menu = parse_menu(PLAN_FIXTURE, 421, day());

        let all = build_menu_message(&menu, MealFilter::All);
        assert!(all.contains("🥑 \\= vegan"));
        assert!(all.contains("🐷 \\= Schwein"));

        let veggy = build_menu_message(&menu, MealFilter::Vegetarian);
        assert!(veggy.contains("🥑 \\= vegan"));
        assert!(!veggy.contains("🐷 \\= Schwein"));

        let vegan = build_menu_message(&menu, MealFilter::Vegan);
        assert!(!vegan.contains("\\= vegan"));
    }
}
