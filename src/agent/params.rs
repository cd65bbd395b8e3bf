// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Per-call input parameters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::prompt::Placeholder;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallParametersError {
    #[error("call parameter `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// Everything the agent needs to know about one call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParameters {
    phone_number: String,
    company_name: String,
    customer_name: String,
    account_number: String,
    desired_resolution: String,
    product_or_service: String,
    issue_description: String,
    proof: String,
}

impl CallParameters {
    pub fn builder() -> CallParametersBuilder {
        CallParametersBuilder::default()
    }

    /// Destination for the outbound dial.
    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn desired_resolution(&self) -> &str {
        &self.desired_resolution
    }

    pub fn product_or_service(&self) -> &str {
        &self.product_or_service
    }

    pub fn issue_description(&self) -> &str {
        &self.issue_description
    }

    pub fn proof(&self) -> &str {
        &self.proof
    }

    /// Value substituted for a prompt placeholder.
    pub fn value_for(&self, key: Placeholder) -> &str {
        match key {
            Placeholder::CustomerName => &self.customer_name,
            Placeholder::CompanyName => &self.company_name,
            Placeholder::DesiredResolution => &self.desired_resolution,
            Placeholder::AccountNumber => &self.account_number,
            Placeholder::ProductOrService => &self.product_or_service,
            Placeholder::IssueDescription => &self.issue_description,
            Placeholder::Proof => &self.proof,
        }
    }

    /// The seven prompt fields keyed by placeholder name.
    pub fn prompt_values(&self) -> HashMap<String, String> {
        Placeholder::ALL
            .into_iter()
            .map(|key| (key.key().to_string(), self.value_for(key).to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallParametersBuilder {
    phone_number: Option<String>,
    company_name: Option<String>,
    customer_name: Option<String>,
    account_number: Option<String>,
    desired_resolution: Option<String>,
    product_or_service: Option<String>,
    issue_description: Option<String>,
    proof: Option<String>,
}

macro_rules! builder_setters {
    ($($field:ident),+ $(,)?) => {
        $(
            pub fn $field(mut self, value: impl Into<String>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )+
    };
}

fn require(value: Option<String>, field: &'static str) -> Result<String, CallParametersError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CallParametersError::MissingField(field)),
    }
}

impl CallParametersBuilder {
    builder_setters!(
        phone_number,
        company_name,
        customer_name,
        account_number,
        desired_resolution,
        product_or_service,
        issue_description,
        proof,
    );

    /// Fails on the first missing or blank field, in declaration order.
    pub fn build(self) -> Result<CallParameters, CallParametersError> {
        Ok(CallParameters {
            phone_number: require(self.phone_number, "phone_number")?,
            company_name: require(self.company_name, "company_name")?,
            customer_name: require(self.customer_name, "customer_name")?,
            account_number: require(self.account_number, "account_number")?,
            desired_resolution: require(self.desired_resolution, "desired_resolution")?,
            product_or_service: require(self.product_or_service, "product_or_service")?,
            issue_description: require(self.issue_description, "issue_description")?,
            proof: require(self.proof, "proof")?,
        })
    }
}
