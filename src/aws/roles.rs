use tracing::{debug, warn};

use crate::constants::{AWS_ROLE_ATTRIBUTE, MAX_SELECTION_ATTEMPTS};
use crate::error::{RoleError, SamlError};
use crate::prompt::Interaction;
use crate::saml::SamlResponse;

/// AWS IAM Role structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRole {
    pub name: String,
    pub role_arn: String,
    pub principal_arn: String,
}

/// Roles offered by an assertion; the empty case is rejected at construction
#[derive(Debug, Clone)]
pub enum AvailableRoles {
    /// Single role (auto-selected)
    Single(IamRole),
    /// Multiple roles (explicit selection required)
    Multiple(Vec<IamRole>),
}

/// Extract every well-formed role pair from the assertion, in document order.
///
/// Values without a comma are skipped rather than failing the whole assertion.
pub fn extract_roles(saml_response: &SamlResponse) -> Result<Vec<IamRole>, SamlError> {
    let role_values = saml_response.get_attribute_values(AWS_ROLE_ATTRIBUTE)?;
    let roles = role_values
        .iter()
        .filter_map(|value| {
            let role = IamRole::parse_arn_pair(value);
            if role.is_none() {
                warn!("Skipping malformed role attribute value: {}", value);
            }
            role
        })
        .collect();
    Ok(roles)
}

impl TryFrom<Vec<IamRole>> for AvailableRoles {
    type Error = RoleError;

    fn try_from(mut roles: Vec<IamRole>) -> Result<Self, Self::Error> {
        match roles.len() {
            0 => Err(RoleError::NoRoles),
            1 => Ok(AvailableRoles::Single(roles.remove(0))),
            _ => Ok(AvailableRoles::Multiple(roles)),
        }
    }
}

impl AvailableRoles {
    /// Decide which role to assume.
    ///
    /// A preferred role is matched by name or full ARN. Without one, multiple
    /// roles are put to the user, re-asking on out-of-range answers.
    pub fn select(
        self,
        preferred: Option<&str>,
        interaction: &dyn Interaction,
    ) -> Result<IamRole, RoleError> {
        match self {
            AvailableRoles::Single(role) => {
                if let Some(name) = preferred {
                    if !role.matches(name) {
                        return Err(RoleError::Mismatch {
                            name: name.to_string(),
                            available: role.name,
                        });
                    }
                }
                Ok(role)
            }
            AvailableRoles::Multiple(roles) => match preferred {
                Some(name) => {
                    let available = roles
                        .iter()
                        .map(|r| r.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");

                    roles
                        .into_iter()
                        .find(|r| r.matches(name))
                        .ok_or_else(|| RoleError::NotFound {
                            name: name.to_string(),
                            available,
                        })
                }
                None => prompt_for_role(roles, interaction),
            },
        }
    }

    /// Get all roles as a slice
    pub fn as_slice(&self) -> &[IamRole] {
        match self {
            AvailableRoles::Single(role) => std::slice::from_ref(role),
            AvailableRoles::Multiple(roles) => roles.as_slice(),
        }
    }
}

fn prompt_for_role(
    mut roles: Vec<IamRole>,
    interaction: &dyn Interaction,
) -> Result<IamRole, RoleError> {
    for _ in 0..MAX_SELECTION_ATTEMPTS {
        let index = interaction
            .select_role(&roles)
            .map_err(RoleError::Prompt)?;
        if index < roles.len() {
            debug!("Selected role {}", roles[index].role_arn);
            return Ok(roles.swap_remove(index));
        }
        warn!("Role selection {} is out of range", index);
    }
    Err(RoleError::AmbiguousSelection {
        attempts: MAX_SELECTION_ATTEMPTS,
    })
}

impl IamRole {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.role_arn == name
    }

    /// Split "roleArn,providerArn" on the first comma
    fn parse_arn_pair(arn_pair: &str) -> Option<Self> {
        let (first, second) = arn_pair.split_once(',')?;
        let (first, second) = (first.trim(), second.trim());
        if first.is_empty() || second.is_empty() {
            return None;
        }

        // Some IdPs emit the provider first
        let (role_arn, principal_arn) =
            if first.contains(":saml-provider/") && second.contains(":role/") {
                (second.to_string(), first.to_string())
            } else {
                (first.to_string(), second.to_string())
            };

        // Extract role name from ARN (arn:aws:iam::123456789012:role/RoleName)
        let name = role_arn
            .split('/')
            .next_back()
            .map_or_else(|| "UnknownRole".to_string(), String::from);

        Some(IamRole {
            name,
            role_arn,
            principal_arn,
        })
    }
}
