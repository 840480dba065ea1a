//! Built-in plan category descriptors

/// One selectable cleaning-plan category, with Norwegian and English labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCategory {
    pub id: &'static str,
    pub label_no: &'static str,
    pub label_en: &'static str,
}

/// Categories a generation request may target
pub const PLAN_CATEGORIES: &[PlanCategory] = &[
    PlanCategory {
        id: "standard",
        label_no: "Standard renhold",
        label_en: "Standard cleaning",
    },
    PlanCategory {
        id: "office",
        label_no: "Kontorbygg",
        label_en: "Office building",
    },
    PlanCategory {
        id: "school",
        label_no: "Skole og barnehage",
        label_en: "School and kindergarten",
    },
    PlanCategory {
        id: "healthcare",
        label_no: "Helsebygg",
        label_en: "Healthcare facility",
    },
    PlanCategory {
        id: "industrial",
        label_no: "Industri og lager",
        label_en: "Industry and warehouse",
    },
];

/// Look up a category by id
pub fn plan_category(id: &str) -> Option<&'static PlanCategory> {
    PLAN_CATEGORIES.iter().find(|category| category.id == id)
}
