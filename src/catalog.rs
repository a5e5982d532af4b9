//! Diagnostic test catalog — immutable reference data.
//!
//! Loaded once at startup. Lookups are read-only, so the catalog is shared
//! freely across request handlers without locking. Each entry also carries
//! the symptom keywords consulted by the default scorer, so all reference
//! data lives in one place.

use crate::models::Test;

/// Read-only catalog of available lab tests, stable-ordered by code.
pub struct Catalog {
    tests: Vec<Test>,
}

impl Catalog {
    pub fn new(mut tests: Vec<Test>) -> Self {
        tests.sort_by(|a, b| a.code.cmp(&b.code));
        Self { tests }
    }

    /// Built-in seed set. The demo client books CBC at 50.
    pub fn with_seed_data() -> Self {
        Self::new(seed_tests())
    }

    /// All tests in stable order (by code).
    pub fn list(&self) -> &[Test] {
        &self.tests
    }

    /// Case-insensitive lookup by test code.
    pub fn get(&self, code: &str) -> Option<&Test> {
        let code = code.trim();
        self.tests
            .iter()
            .find(|t| t.code.eq_ignore_ascii_case(code))
    }

    /// Position of a test in catalog order. Used as a ranking tie-breaker.
    pub fn position(&self, code: &str) -> usize {
        self.tests
            .iter()
            .position(|t| t.code.eq_ignore_ascii_case(code))
            .unwrap_or(usize::MAX)
    }
}

fn test(
    code: &str,
    name: &str,
    category: &str,
    price: f64,
    preparation: &str,
    keywords: &[&'static str],
) -> Test {
    Test {
        code: code.into(),
        name: name.into(),
        category: category.into(),
        price,
        preparation: preparation.into(),
        keywords: keywords.to_vec(),
    }
}

fn seed_tests() -> Vec<Test> {
    vec![
        test(
            "CBC",
            "Complete Blood Count",
            "Hematology",
            50.0,
            "No special preparation required.",
            &["fever", "chills", "fatigue", "weakness", "infection", "pallor", "bruising"],
        ),
        test(
            "CRP",
            "C-Reactive Protein",
            "Immunology",
            40.0,
            "No special preparation required.",
            &["fever", "inflammation", "swelling", "pain", "infection"],
        ),
        test(
            "DENGUE",
            "Dengue NS1 Antigen",
            "Serology",
            90.0,
            "Best within the first 5 days of fever.",
            &["fever", "chills", "headache", "rash", "joint", "eye"],
        ),
        test(
            "HBA1C",
            "Glycated Hemoglobin (HbA1c)",
            "Biochemistry",
            60.0,
            "No fasting required.",
            &["thirst", "urination", "diabetes", "sugar", "blurred", "tingling"],
        ),
        test(
            "KFT",
            "Kidney Function Test",
            "Biochemistry",
            70.0,
            "Avoid heavy exercise for 24 hours before the test.",
            &["swelling", "urination", "kidney", "back", "puffy"],
        ),
        test(
            "LFT",
            "Liver Function Test",
            "Biochemistry",
            75.0,
            "Fast for 8 hours before sample collection.",
            &["jaundice", "yellow", "nausea", "appetite", "abdomen", "liver"],
        ),
        test(
            "LIPID",
            "Lipid Profile",
            "Biochemistry",
            80.0,
            "Fast for 10-12 hours before sample collection.",
            &["cholesterol", "chest", "breathless", "palpitations", "weight"],
        ),
        test(
            "MP",
            "Malaria Parasite Smear",
            "Microbiology",
            45.0,
            "Sample is best taken during a fever spike.",
            &["fever", "chills", "sweating", "shivering", "headache"],
        ),
        test(
            "TSH",
            "Thyroid Stimulating Hormone",
            "Endocrinology",
            55.0,
            "Morning sample preferred.",
            &["fatigue", "weight", "hair", "cold", "neck", "thyroid", "mood"],
        ),
        test(
            "URINE",
            "Urine Routine & Microscopy",
            "Pathology",
            30.0,
            "Collect a mid-stream morning sample.",
            &["burning", "urination", "urine", "frequency", "cloudy"],
        ),
        test(
            "VITB12",
            "Vitamin B12",
            "Biochemistry",
            85.0,
            "Fast for 8 hours before sample collection.",
            &["tingling", "numbness", "fatigue", "memory", "tongue"],
        ),
        test(
            "VITD",
            "Vitamin D (25-OH)",
            "Biochemistry",
            95.0,
            "No special preparation required.",
            &["bone", "ache", "fatigue", "muscle", "cramps", "weakness"],
        ),
    ]
}
