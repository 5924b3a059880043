//! Built-in token vocabulary.

pub(super) const DIAGNOSIS_FACTS: &[&str] = &[
    "Dx.AcuteFattyLiverOfPregnancy",
    "Dx.Asthma",
    "Dx.Eclampsia",
    "Dx.FetalDemise",
    "Dx.GestationalHypertension",
    "Dx.HELLPSyndrome",
    "Dx.HeartBlock",
    "Dx.HeartFailure",
    "Dx.HypertensiveDisorder",
    "Dx.PlacentaPrevia",
    "Dx.PlacentalAbruption",
    "Dx.Preeclampsia",
];

pub(super) const ATTRIBUTE_FACTS: &[&str] = &["DxAttr.Preeclampsia.Severe"];

pub(super) const CONTEXT_FACTS: &[&str] = &[
    "Ctx.ChronicHypertension",
    "Ctx.ChronicKidneyDisease",
    "Ctx.DiabetesMellitus",
    "Ctx.MultipleGestation",
    "Ctx.PriorCesarean",
    "Ctx.Labor",
    "Ctx.RupturedMembranes",
    "Ctx.NonReassuringFetalStatus",
    "Ctx.FetalGrowthRestriction",
    "Ctx.MaternalHemodynamicInstability",
    "Ctx.SevereRangeBloodPressure",
    "Ctx.Thrombocytopenia",
    "Ctx.PulmonaryEdema",
    "Ctx.AcuteKidneyInjury",
    "Ctx.ElevatedLiverEnzymes",
    "Ctx.NeurologicSymptoms",
];

/// Discretized gestational age, maternal age and BMI buckets.
pub(super) const BUCKET_FACTS: &[&str] = &[
    "Ctx.GA_<34w",
    "Ctx.GA_>=20w",
    "Ctx.GA_>=28w",
    "Ctx.GA_>=34w",
    "Ctx.GA_>=37w",
    "Ctx.GA_>=42w",
    "Ctx.MaternalAge_<35y",
    "Ctx.MaternalAge_>=35y",
    "Ctx.MaternalAge_>=40y",
    "Ctx.MaternalAge_>=45y",
    "Ctx.BMI_<25",
    "Ctx.BMI_>=25",
    "Ctx.BMI_>=30",
    "Ctx.BMI_>=35",
    "Ctx.BMI_>=40",
];

pub(super) const ACTIONS: &[&str] = &[
    "Action.ExpectantManagement",
    "Action.ExpeditedDelivery",
    "Action.ImmediateDelivery",
];
