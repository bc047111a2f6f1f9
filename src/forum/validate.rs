// Field rules for the user-facing forms.
use super::{ForumError, ForumResult};

fn length_between(field: &str, value: &str, min: usize, max: Option<usize>) -> ForumResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(ForumError::Validation(match min {
            1 => format!("{field} is required."),
            _ => format!("{field} must be at least {min} characters."),
        }));
    }
    if let Some(max) = max {
        if len > max {
            return Err(ForumError::Validation(format!(
                "{field} must be at most {max} characters."
            )));
        }
    }
    Ok(())
}

pub fn username(value: &str) -> ForumResult<()> {
    length_between("Username", value, 3, Some(32))
}

pub fn password(value: &str) -> ForumResult<()> {
    length_between("Password", value, 6, None)
}

pub fn subreddit_name(value: &str) -> ForumResult<()> {
    length_between("Name", value, 2, Some(50))?;
    // Names appear unescaped in `/r/{name}` paths and links.
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ForumError::Validation(
            "Name may only contain letters, digits, '_' and '-'.".into(),
        ));
    }
    Ok(())
}

pub fn post_title(value: &str) -> ForumResult<()> {
    length_between("Title", value, 1, Some(200))
}

pub fn comment_body(value: &str) -> ForumResult<()> {
    length_between("Comment", value, 1, None)
}
