use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission granted on a shared folder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Access {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl Access {
    pub fn can_read(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "r",
            Access::Write => "w",
            Access::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Access::Read),
            "w" => Ok(Access::Write),
            "rw" => Ok(Access::ReadWrite),
            other => Err(format!("unknown access '{other}', expected r, w or rw")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRequest {
    pub access: Access,
    pub folder_name: String,
    pub otp: String,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareResponse {
    pub link_url: String,
    pub folder_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareAuthRequest {
    pub link_url: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareAuthResponse {
    pub access_token: String,
    pub folder_id: String,
}

/// A file listed in a shared folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedFile {
    pub file_name: String,
    pub file_extension: String,
    pub file_size: u64,
}

impl SharedFile {
    pub fn display_name(&self) -> String {
        format!("{}{}", self.file_name, self.file_extension)
    }

    /// Zip entries are the folder bundle, not user files.
    pub fn is_bundle(&self) -> bool {
        self.file_extension.eq_ignore_ascii_case(".zip")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedFilesResponse {
    pub files: Vec<SharedFile>,
}
