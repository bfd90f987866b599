//! Label-based assertions over the current target document.
//!
//! Assertions share the locator's hard-failure semantics: a query that
//! matches nothing fails the case on the spot rather than returning an
//! empty result for the caller to inspect.

use crate::context::TargetContext;
use crate::locator::{self, Role};
use crate::result::{TocarError, TocarResult};

/// Expected state of a form field.
///
/// Checkbox and radio inputs are compared against their checked tri-state;
/// every other field is compared against its exact string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A checkbox or radio that is checked
    Checked,
    /// A checkbox or radio that is unchecked and not indeterminate
    Unchecked,
    /// A checkbox in the indeterminate state
    Indeterminate,
    /// Exact string value of a text-like field
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Assert that exactly `expected` elements match the role and label.
///
/// Matching zero elements fails before the count is compared, so an
/// expected count of zero can never be satisfied; use
/// [`no_elements_match`] for absence.
pub fn count_elements_with_label(
    target: &TargetContext,
    role: Role,
    label: &str,
    expected: usize,
) -> TocarResult<()> {
    let found = locator::find_all(target, role, label)?.len();
    if found != expected {
        return Err(TocarError::assertion(format!(
            "Expected {expected} {role} elements with label \"{label}\", found {found}"
        )));
    }
    Ok(())
}

/// Assert that no elements match the role and label
pub fn no_elements_match(target: &TargetContext, role: Role, label: &str) -> TocarResult<()> {
    let found = target.with_doc(|doc| locator::matching_nodes(doc, role, label).len())?;
    if found != 0 {
        return Err(TocarError::assertion(format!(
            "Expected no {role} elements with label \"{label}\", found {found}"
        )));
    }
    Ok(())
}

/// Assert that the nth element matching the role and label holds focus
pub fn element_should_have_focus(
    target: &TargetContext,
    role: Role,
    label: &str,
    position: usize,
) -> TocarResult<()> {
    let element = locator::find(target, role, label, position)?;
    if target.active_element() != Some(element) {
        return Err(TocarError::assertion(format!(
            "Expected the {role} with label \"{label}\" to have focus"
        )));
    }
    Ok(())
}

/// Assert the value of the nth form field matching the label.
///
/// Checkbox and radio fields are asserted against their checked
/// tri-state; asserting a text expectation on them, or a tri-state on a
/// text field, is a usage error.
pub fn field_should_have_value(
    target: &TargetContext,
    label: &str,
    position: usize,
    expected: &FieldValue,
) -> TocarResult<()> {
    let element = locator::find(target, Role::FormField, label, position)?;
    let node = target.resolve(element)?;
    let (input_type, value, checked, indeterminate) = target.with_doc(|doc| {
        (
            doc.input_type(node).unwrap_or("").to_string(),
            doc.value(node).to_string(),
            doc.is_checked(node),
            doc.is_indeterminate(node),
        )
    })?;

    let toggles = input_type == "checkbox" || input_type == "radio";
    match expected {
        FieldValue::Checked | FieldValue::Unchecked | FieldValue::Indeterminate => {
            if !toggles {
                return Err(TocarError::usage(format!(
                    "Field \"{label}\" is not a checkbox or radio"
                )));
            }
            let satisfied = match expected {
                FieldValue::Checked => checked && !indeterminate,
                FieldValue::Unchecked => !checked && !indeterminate,
                FieldValue::Indeterminate => indeterminate,
                FieldValue::Text(_) => unreachable!(),
            };
            if !satisfied {
                let want = match expected {
                    FieldValue::Checked => "checked",
                    FieldValue::Unchecked => "unchecked",
                    _ => "indeterminate",
                };
                return Err(TocarError::assertion(format!(
                    "Expected field \"{label}\" to be {want}"
                )));
            }
        }
        FieldValue::Text(want) => {
            if toggles {
                return Err(TocarError::usage(format!(
                    "Field \"{label}\" is a checkbox or radio; assert checked state instead"
                )));
            }
            if &value != want {
                return Err(TocarError::assertion(format!(
                    "Expected field \"{label}\" to have value \"{want}\", found \"{value}\""
                )));
            }
        }
    }
    Ok(())
}
