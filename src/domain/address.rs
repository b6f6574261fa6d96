//! Email address helpers shared by the compose form, the send workflow and
//! the address book.

/// Basic structural validation of an email address.
///
/// Accepts `local@domain.tld` with a non-empty local part, no whitespace and
/// a dotted domain that neither starts nor ends with a dot.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Returns the first address in `addresses` that fails validation.
pub fn first_invalid<'a, I>(addresses: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    addresses
        .into_iter()
        .map(String::as_str)
        .find(|addr| !is_valid_email(addr))
}
