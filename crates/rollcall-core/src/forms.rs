//! Local validation for the login and registration forms.
//!
//! Forms are checked before anything touches the network. A valid form
//! converts into the request payload the auth service sends.

use thiserror::Error;

use crate::models::{InstructorSignupRequest, LoginRequest, StudentSignupRequest};

/// Minimum password length accepted by the server
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Student numbers are exactly this many digits
pub const STUDENT_NUMBER_DIGITS: usize = 9;

const MAX_NAME_LENGTH: usize = 100;
const MAX_BIO_LENGTH: usize = 500;
const MAX_DEPARTMENT_LENGTH: usize = 100;
const MAX_OFFICE_LOCATION_LENGTH: usize = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingLoginFields,

    #[error("Please fill in all required fields")]
    MissingRequiredFields,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Student number must be exactly 9 digits")]
    InvalidStudentNumber,

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Blank optional input becomes `None`
fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ValidationError::InvalidEmail),
    }
}

fn check_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() > max {
        Err(ValidationError::TooLong { field, max })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ValidationError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingLoginFields);
        }
        Ok(LoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentRegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub student_number: String,
    pub major: String,
}

impl StudentRegistrationForm {
    pub fn validate(&self) -> Result<StudentSignupRequest, ValidationError> {
        if [
            &self.email,
            &self.password,
            &self.confirm_password,
            &self.first_name,
            &self.last_name,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(ValidationError::MissingRequiredFields);
        }
        check_email(self.email.trim())?;
        check_password(&self.password, &self.confirm_password)?;

        let number = optional(&self.student_number);
        if let Some(ref number) = number {
            if number.len() != STUDENT_NUMBER_DIGITS || !number.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::InvalidStudentNumber);
            }
        }
        check_length("First name", &self.first_name, MAX_NAME_LENGTH)?;
        check_length("Last name", &self.last_name, MAX_NAME_LENGTH)?;
        check_length("Bio", &self.bio, MAX_BIO_LENGTH)?;

        Ok(StudentSignupRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            // Student signups always carry a bio, empty when left blank
            bio: Some(self.bio.trim().to_string()),
            number,
            major: optional(&self.major),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstructorRegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub department: String,
    pub office_location: String,
}

impl InstructorRegistrationForm {
    pub fn validate(&self) -> Result<InstructorSignupRequest, ValidationError> {
        if [
            &self.email,
            &self.password,
            &self.confirm_password,
            &self.first_name,
            &self.last_name,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(ValidationError::MissingRequiredFields);
        }
        check_email(self.email.trim())?;
        check_password(&self.password, &self.confirm_password)?;
        check_length("First name", &self.first_name, MAX_NAME_LENGTH)?;
        check_length("Last name", &self.last_name, MAX_NAME_LENGTH)?;
        check_length("Bio", &self.bio, MAX_BIO_LENGTH)?;
        check_length("Department", &self.department, MAX_DEPARTMENT_LENGTH)?;
        check_length("Office location", &self.office_location, MAX_OFFICE_LOCATION_LENGTH)?;

        Ok(InstructorSignupRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            bio: optional(&self.bio),
            department: optional(&self.department),
            office_location: optional(&self.office_location),
        })
    }
}
