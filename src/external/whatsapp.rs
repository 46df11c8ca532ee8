use reqwest::Url;

use crate::entities::ContactLink;
use crate::error::Error;

const BASE: &str = "https://wa.me/";

/// Which side of an accepted bid is reaching out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    Garage,
    Owner,
}

pub fn message(sender: Sender, name: &str, title: &str, amount: f64) -> String {
    match sender {
        Sender::Garage => format!(
            "Hello {}! I'm contacting you regarding your repair request \"{}\". My bid of AED {} has been accepted. When would be convenient to discuss the repair details?",
            name, title, amount
        ),
        Sender::Owner => format!(
            "Hello {}! I accepted your bid of AED {} for my repair request \"{}\". When would be convenient to discuss the repair details?",
            name, amount, title
        ),
    }
}

/// Builds a `wa.me` deep link. Everything but digits is stripped from the phone.
pub fn link(phone: &str, message: String) -> Result<ContactLink, Error> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(Error::invalid_input_error(
            "The other party has no phone number on file",
        ));
    }

    let url = Url::parse_with_params(&format!("{}{}", BASE, digits), &[("text", &message)])
        .map_err(|_| Error::unexpected_error())?;

    Ok(ContactLink {
        url: url.to_string(),
        phone: digits,
        message,
    })
}

#[test]
fn link_strips_phone_and_encodes_text() {
    let text = message(Sender::Garage, "Ahmed Hassan", "Engine Oil Leak Repair", 500.0);
    let link = link("+971 50-123 4567", text.clone()).unwrap();

    assert_eq!(link.phone, "971501234567");
    assert!(link.url.starts_with("https://wa.me/971501234567?text="));
    assert!(!link.url.contains(' '));

    let url = Url::parse(&link.url).unwrap();
    let (key, value) = url.query_pairs().next().unwrap();
    assert_eq!(key, "text");
    assert_eq!(value, text);
}

#[test]
fn garage_message_template() {
    assert_eq!(
        message(Sender::Garage, "Ahmed", "AC Service", 450.5),
        "Hello Ahmed! I'm contacting you regarding your repair request \"AC Service\". My bid of AED 450.5 has been accepted. When would be convenient to discuss the repair details?"
    );
}

#[test]
fn link_requires_digits() {
    assert!(link("n/a", "hi".into()).unwrap_err().is_invalid_input_error());
}
