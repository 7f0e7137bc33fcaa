//! Page locators for the marketplace UI. Markup drifts; keep every selector here.

use crate::browser::{xpath_literal, Locator};

// Authentication (mobile basic site).
pub fn profile_marker() -> Locator {
    Locator::xpath("//span/strong")
}

pub fn consent_essential_only() -> Locator {
    Locator::xpath("//button[@name='accept_only_essential' and @value='1']")
}

pub fn login_email() -> Locator {
    Locator::name("email")
}

pub fn login_password() -> Locator {
    Locator::name("pass")
}

pub fn login_submit() -> Locator {
    Locator::name("login")
}

pub fn post_login_ok() -> Locator {
    Locator::xpath("//input[@value='OK']")
}

/// Shown when the marketplace has put the session on hold.
pub fn blocked_marker() -> Locator {
    Locator::xpath("//span/span[contains(., 'OK')]")
}

pub fn creation_limit_marker() -> Locator {
    Locator::xpath(
        "/html/body/div[1]/div/div[1]/div/div[3]/div/div/div/div[1]/div[1]/div[1]/div/div[2]/div[1]/div[2]/div/div/div[2]/div/div/div/div/span/div/div/div[2]/div/div[1]/span/span/span",
    )
}

// Create-listing form.
pub fn photos_input() -> Locator {
    Locator::xpath("//input[@type='file'][@multiple]")
}

pub fn title_input() -> Locator {
    Locator::xpath("//*[contains(@aria-label, 'Title')]//input")
}

pub fn price_input() -> Locator {
    Locator::xpath("//*[contains(@aria-label, 'Price')]//input")
}

pub fn category_dropdown() -> Locator {
    Locator::xpath("//*[contains(@aria-label, 'Category')]//div/div")
}

pub fn category_option(category: &str) -> Locator {
    Locator::xpath(format!(
        "//span/div/span[contains(., {})]",
        xpath_literal(category)
    ))
}

pub fn condition_dropdown() -> Locator {
    Locator::xpath("//label[contains(., 'Condition')]//div/div")
}

pub fn availability_dropdown() -> Locator {
    Locator::xpath("//label[contains(., 'Availability')]//div/div")
}

/// Option entries of the condition and availability dropdowns.
pub fn dropdown_option(text: &str) -> Locator {
    Locator::xpath(format!("//span[contains(., {})]", xpath_literal(text)))
}

pub fn description_input() -> Locator {
    Locator::xpath("//*[contains(@aria-label, 'Description')]//textarea")
}

pub fn tags_input() -> Locator {
    Locator::xpath("//*[contains(@aria-label, 'Product tags')]//textarea")
}

pub fn location_input() -> Locator {
    Locator::xpath("//label[contains(., 'Location')]//input")
}

pub fn location_suggestions() -> Locator {
    Locator::xpath("//ul[@role='listbox']/li[@role='option']")
}

pub fn first_location_suggestion() -> Locator {
    location_suggestions().nth(1)
}

/// Second checkbox on the form: "hide from friends".
pub fn hide_from_friends() -> Locator {
    Locator::xpath("(//input[@type='checkbox'])[2]")
}

pub fn next_button() -> Locator {
    Locator::xpath("//span[contains(., 'Next')]/span")
}

pub fn publish_button() -> Locator {
    Locator::xpath("//span[contains(., 'Publish')]/span")
}

// Selling page.
pub fn selling_cards() -> Locator {
    Locator::xpath(
        "//div[contains(@style, 'border-radius: max(0px, min(var(--card-corner-radius), calc((100vw - 4px - 100%) * 9999))) / var(--card-corner-radius);')]/../..",
    )
}

pub fn feed_loading() -> Locator {
    Locator::xpath(
        "//div[@aria-label='Loading...' and @role='status' and @data-visualcompletion='loading-state']",
    )
}

pub const CARD_CLICKS: &str = "//div[@aria-label=\"The number of times people viewed the details page of your Marketplace listing in the last 14 days.\"]/..";

pub fn listing_dialog_title() -> Locator {
    Locator::xpath("(((//div[@aria-label='Your Listing']//a/div)[1]/div)[2]/div/div/span)[1]")
}

pub fn listing_dialog_location() -> Locator {
    Locator::xpath(
        "//div[@aria-label='Your Listing']//a//span/span/span/span[@aria-hidden='true']/../..",
    )
}

pub fn dialog_close() -> Locator {
    Locator::xpath("//div[@aria-label='Close']")
}

// Activity log.
pub fn activity_item() -> Locator {
    Locator::xpath("//div[@aria-label='Activity Log Item']/div/div/div/div/div/div[2]/div[2]")
}

pub fn activity_actions() -> Locator {
    Locator::xpath("//div[@aria-label='Action options']").nth(1)
}

pub fn delete_entry() -> Locator {
    Locator::xpath("//div[span[text()='Delete']]")
}

pub fn delete_confirm() -> Locator {
    Locator::xpath("//span[span[text()='Delete']]")
}
