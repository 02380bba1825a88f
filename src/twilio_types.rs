use serde::{Deserialize, Serialize};

/// Form body for the Messages resource.
#[derive(Serialize, Debug)]
pub struct CreateMessageForm<'a> {
    #[serde(rename = "To")]
    pub to: &'a str,
    #[serde(rename = "From")]
    pub from: &'a str,
    #[serde(rename = "Body")]
    pub body: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct MessageResource {
    pub sid: String,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TwilioErrorResponse {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub more_info: Option<String>,
}
