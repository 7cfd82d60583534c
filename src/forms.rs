//! Dashboard and account form payloads, and their validation.

use serde::Deserialize;

use crate::models::{AccountKind, AdType, NewAdvertisement, NewContentLink};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0} is required.")]
    Required(&'static str),

    #[error("{0} must start with http:// or https://")]
    NotHttp(&'static str),

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Password must be at least 8 characters.")]
    PasswordTooShort,

    #[error("Unknown account type '{0}'.")]
    UnknownAccountType(String),

    #[error("Unknown ad type '{0}'.")]
    UnknownAdType(String),
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub account_type: String,
    pub organization: String,
    pub website: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkForm {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdForm {
    pub title: String,
    pub ad_type: String,
    pub image_url: Option<String>,
    pub html_content: Option<String>,
    pub click_url: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A category set submitted from a checkbox list.
#[derive(Debug, Deserialize)]
pub struct CategoriesForm {
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Validated sign-up fields.
#[derive(Debug, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub kind: AccountKind,
    pub organization: String,
    pub website: Option<String>,
}

/// Lower-cased, trimmed email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl SignUpForm {
    pub fn validate(&self) -> Result<SignUp, FormError> {
        let email = normalize_email(&self.email);
        if email.is_empty() {
            return Err(FormError::Required("Email"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(FormError::InvalidEmail),
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort);
        }
        let kind = match self.account_type.as_str() {
            "content_provider" => AccountKind::ContentProvider,
            "advertiser" => AccountKind::Advertiser,
            other => return Err(FormError::UnknownAccountType(other.to_owned())),
        };
        let organization = required(&self.organization, "Organization name")?;

        Ok(SignUp {
            email,
            password: self.password.clone(),
            kind,
            organization,
            website: optional(self.website.as_deref()),
        })
    }
}

impl CreateLinkForm {
    /// Validate the form into a new link carrying `short_code`.
    pub fn validate(&self, short_code: String) -> Result<NewContentLink, FormError> {
        let original_url = http_url(&self.url, "URL")?;
        let title = required(&self.title, "Title")?;

        Ok(NewContentLink {
            original_url,
            short_code,
            title,
            description: optional(self.description.as_deref()),
        })
    }
}

impl CreateAdForm {
    /// Validate the form. Only the creative matching the ad type is kept.
    pub fn validate(&self) -> Result<NewAdvertisement, FormError> {
        let title = required(&self.title, "Title")?;
        let ad_type = match self.ad_type.trim() {
            "image" => AdType::Image,
            "html" => AdType::Html,
            other => return Err(FormError::UnknownAdType(other.to_owned())),
        };

        let (image_url, html_content) = match ad_type {
            AdType::Image => {
                let url = optional(self.image_url.as_deref())
                    .ok_or(FormError::Required("Image URL"))?;
                (Some(http_url(&url, "Image URL")?), None)
            }
            AdType::Html => {
                let html = optional(self.html_content.as_deref())
                    .ok_or(FormError::Required("HTML content"))?;
                (None, Some(html))
            }
        };

        let click_url = http_url(&self.click_url, "Click URL")?;

        Ok(NewAdvertisement {
            title,
            ad_type,
            image_url,
            html_content,
            click_url,
        })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        Err(FormError::Required(field))
    } else {
        Ok(value.to_owned())
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

fn http_url(value: &str, field: &'static str) -> Result<String, FormError> {
    let url = required(value, field)?;
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(FormError::NotHttp(field))
    }
}
