use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("male"),
            Gender::Female => f.write_str("female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeCategory {
    Baby,
    Child,
    Teen,
    Adult,
    Senior,
}

impl AgeCategory {
    /// Inclusive range of ages, in years, accepted for this category.
    pub fn range(&self) -> RangeInclusive<u32> {
        match self {
            AgeCategory::Baby => 0..=2,
            AgeCategory::Child => 3..=9,
            AgeCategory::Teen => 10..=17,
            AgeCategory::Adult => 18..=64,
            AgeCategory::Senior => 65..=120,
        }
    }

    pub fn min_age(&self) -> u32 {
        *self.range().start()
    }

    /// Whether `age` (as typed by the user) parses and falls inside the range.
    pub fn accepts(&self, age: &str) -> bool {
        age.trim()
            .parse::<u32>()
            .map(|years| self.range().contains(&years))
            .unwrap_or(false)
    }
}

impl fmt::Display for AgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgeCategory::Baby => "baby",
            AgeCategory::Child => "child",
            AgeCategory::Teen => "teen",
            AgeCategory::Adult => "adult",
            AgeCategory::Senior => "senior",
        };
        f.write_str(name)
    }
}

impl FromStr for AgeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baby" => Ok(AgeCategory::Baby),
            "child" => Ok(AgeCategory::Child),
            "teen" => Ok(AgeCategory::Teen),
            "adult" => Ok(AgeCategory::Adult),
            "senior" => Ok(AgeCategory::Senior),
            other => Err(format!("unknown age category: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    pub cause_name: String,
    #[serde(default)]
    pub cause_suggestion: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub symptom_name: String,
    #[serde(default)]
    pub symptom_suggestion: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSymptom {
    pub symptom_name: String,
}

/// A therapeutic property suggested for the user's concern.
///
/// `causes_addressed` and `symptoms_addressed` are kept as raw JSON: the
/// workflow emits them either as lists or as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapeuticProperty {
    pub property_id: String,
    pub property_name: String,
    #[serde(default)]
    pub property_name_in_english: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub causes_addressed: serde_json::Value,
    #[serde(default)]
    pub symptoms_addressed: serde_json::Value,
    #[serde(default)]
    pub relevancy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalPropertiesResult {
    pub health_concern_in_english: String,
    pub therapeutic_properties: Vec<TherapeuticProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oil {
    pub name_english: String,
    #[serde(default)]
    pub name_local_language: String,
    #[serde(default)]
    pub oil_description: String,
    #[serde(default)]
    pub relevancy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOils {
    pub property_id: String,
    pub property_name: String,
    #[serde(default)]
    pub property_name_in_english: String,
    #[serde(default)]
    pub description: String,
    pub suggested_oils: Vec<Oil>,
}

/// Everything the wizard has collected so far.
///
/// This is also the session snapshot format. `is_loading` mirrors the wizard's
/// global loading flag and is never written to the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardFormData {
    pub health_concern: Option<String>,
    pub gender: Option<Gender>,
    pub age_category: Option<AgeCategory>,
    pub age_specific: Option<String>,
    pub potential_causes_result: Option<Vec<Cause>>,
    pub selected_causes: Option<Vec<Cause>>,
    pub potential_symptoms_result: Option<Vec<Symptom>>,
    pub selected_symptoms: Option<Vec<SelectedSymptom>>,
    pub medical_properties_result: Option<MedicalPropertiesResult>,
    pub selected_therapeutic_properties: Option<Vec<TherapeuticProperty>>,
    pub suggested_oils_by_property: Option<BTreeMap<String, PropertyOils>>,
    pub final_selected_oils: Option<Vec<Oil>>,
    #[serde(skip)]
    pub is_loading: bool,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! form_patch {
    ($($field:ident: $ty:ty),+ $(,)?) => {
        /// Partial update of [`WizardFormData`].
        ///
        /// `None` leaves the field untouched, `Some(None)` clears it and
        /// `Some(Some(v))` overwrites it.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct FormDataPatch {
            $(
                #[serde(
                    default,
                    deserialize_with = "double_option",
                    skip_serializing_if = "Option::is_none"
                )]
                pub $field: Option<Option<$ty>>,
            )+
        }

        impl FormDataPatch {
            $(
                pub fn $field(mut self, value: Option<$ty>) -> Self {
                    self.$field = Some(value);
                    self
                }
            )+

            /// Shallow merge: every present key replaces the stored value.
            pub fn apply_to(self, form: &mut WizardFormData) {
                $(
                    if let Some(value) = self.$field {
                        form.$field = value;
                    }
                )+
            }

            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())+
            }
        }
    };
}

form_patch! {
    health_concern: String,
    gender: Gender,
    age_category: AgeCategory,
    age_specific: String,
    potential_causes_result: Vec<Cause>,
    selected_causes: Vec<Cause>,
    potential_symptoms_result: Vec<Symptom>,
    selected_symptoms: Vec<SelectedSymptom>,
    medical_properties_result: MedicalPropertiesResult,
    selected_therapeutic_properties: Vec<TherapeuticProperty>,
    suggested_oils_by_property: BTreeMap<String, PropertyOils>,
    final_selected_oils: Vec<Oil>,
}
