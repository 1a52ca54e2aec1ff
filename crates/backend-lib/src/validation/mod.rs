// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation.
//!
//! A [`Validator`] collects at most one message per field (the first failing
//! check wins) and turns them into `AppError::Validation`.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{TaskFilter, TaskSort};
use taskvault_common::TaskListParams;

pub const MIN_PASSWORD_LENGTH: usize = 8;
/// In bytes, like the other length limits
pub const MAX_PASSWORD_LENGTH: usize = 72;
pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

/// Collects field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless `ok`, keeping any earlier message.
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok && !self.errors.contains_key(field) {
            self.errors.insert(field.to_string(), message.into());
        }
    }

    pub fn check_name(&mut self, name: &str) {
        self.check(!name.is_empty(), "name", "must be provided");
        self.check(
            name.len() <= MAX_NAME_LENGTH,
            "name",
            format!("must be at most {MAX_NAME_LENGTH} bytes long"),
        );
    }

    pub fn check_email(&mut self, email: &str) {
        self.check(!email.is_empty(), "email", "must be provided");
        self.check(EMAIL_REGEX.is_match(email), "email", "must be a valid email address");
    }

    pub fn check_password(&mut self, password: &str) {
        self.check(!password.is_empty(), "password", "must be provided");
        self.check(
            password.len() >= MIN_PASSWORD_LENGTH,
            "password",
            format!("must be at least {MIN_PASSWORD_LENGTH} bytes long"),
        );
        self.check(
            password.len() <= MAX_PASSWORD_LENGTH,
            "password",
            format!("must be at most {MAX_PASSWORD_LENGTH} bytes long"),
        );
    }

    pub fn check_content(&mut self, content: Option<&str>) {
        self.check(content.is_some(), "content", "must be provided");
        self.check(
            content.map_or(true, |c| !c.trim().is_empty()),
            "content",
            "must not be empty",
        );
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

fn parse_bounded(v: &mut Validator, raw: Option<&str>, field: &str, default: i64, max: i64) -> i64 {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return default;
    };
    match raw.parse::<i64>() {
        Ok(n) if (1..=max).contains(&n) => n,
        _ => {
            v.check(false, field, format!("must be an integer between 1 and {max}"));
            default
        },
    }
}

/// Validate the task listing query string.
pub fn task_filter(params: &TaskListParams) -> AppResult<TaskFilter> {
    let mut v = Validator::new();

    let sort = match params.sort.as_deref().filter(|s| !s.is_empty()) {
        None => TaskSort::default(),
        Some(raw) => TaskSort::parse(raw).unwrap_or_else(|| {
            v.check(
                false,
                "sort",
                format!("must be one of {}", TaskSort::ALLOWED.join(", ")),
            );
            TaskSort::default()
        }),
    };
    let page = parse_bounded(&mut v, params.page.as_deref(), "page", 1, MAX_PAGE);
    let page_size = parse_bounded(
        &mut v,
        params.page_size.as_deref(),
        "page_size",
        DEFAULT_PAGE_SIZE,
        MAX_PAGE_SIZE,
    );
    v.finish()?;

    Ok(TaskFilter {
        content: params.content.clone().filter(|c| !c.is_empty()),
        sort,
        page,
        page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(result: AppResult<()>) -> FieldErrors {
        match result {
            Err(AppError::Validation(fields)) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_registration_passes() {
        let mut v = Validator::new();
        v.check_name("Ada Lovelace");
        v.check_email("ada@example.com");
        v.check_password("analytical-engine");
        assert!(v.is_valid());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_first_message_per_field_wins() {
        let mut v = Validator::new();
        v.check_email("");
        let errors = fields(v.finish());
        assert_eq!(errors["email"], "must be provided");
    }

    #[test]
    fn test_email_format() {
        for good in ["a@b", "first.last+tag@sub.example.org", "x_y@host-name.io"] {
            let mut v = Validator::new();
            v.check_email(good);
            assert!(v.is_valid(), "{good} should be accepted");
        }
        for bad in ["plain", "@example.com", "a@", "a@-host.com", "a b@example.com"] {
            let mut v = Validator::new();
            v.check_email(bad);
            assert!(!v.is_valid(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_password_bounds() {
        let check = |p: &str| {
            let mut v = Validator::new();
            v.check_password(p);
            v.is_valid()
        };
        assert!(!check("short"));
        assert!(check(&"x".repeat(8)));
        assert!(check(&"x".repeat(72)));
        assert!(!check(&"x".repeat(73)));
    }

    #[test]
    fn test_name_bounds() {
        let mut v = Validator::new();
        v.check_name(&"n".repeat(256));
        assert!(fields(v.finish())["name"].contains("255"));
    }

    #[test]
    fn test_task_content() {
        let mut v = Validator::new();
        v.check_content(None);
        assert_eq!(fields(v.finish())["content"], "must be provided");

        let mut v = Validator::new();
        v.check_content(Some("   "));
        assert_eq!(fields(v.finish())["content"], "must not be empty");
    }

    #[test]
    fn test_task_filter_defaults() {
        let filter = task_filter(&TaskListParams::default()).unwrap();
        assert_eq!(filter, TaskFilter::default());
    }

    #[test]
    fn test_task_filter_parses_params() {
        let params = TaskListParams {
            sort: Some("-created_at".into()),
            page: Some("3".into()),
            page_size: Some("100".into()),
            content: Some("milk".into()),
        };
        let filter = task_filter(&params).unwrap();
        assert_eq!(filter.sort, TaskSort::CreatedAtDesc);
        assert_eq!(filter.page, 3);
        assert_eq!(filter.page_size, 100);
        assert_eq!(filter.content.as_deref(), Some("milk"));
    }

    #[test]
    fn test_task_filter_rejects_out_of_range() {
        let params = TaskListParams {
            sort: Some("content".into()),
            page: Some("0".into()),
            page_size: Some("101".into()),
            content: None,
        };
        let Err(AppError::Validation(errors)) = task_filter(&params) else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("sort"));
        assert!(errors.contains_key("page"));
        assert!(errors.contains_key("page_size"));

        let params = TaskListParams {
            page: Some("10000001".into()),
            ..TaskListParams::default()
        };
        assert!(task_filter(&params).is_err());

        let params = TaskListParams {
            page_size: Some("ten".into()),
            ..TaskListParams::default()
        };
        assert!(task_filter(&params).is_err());
    }
}
