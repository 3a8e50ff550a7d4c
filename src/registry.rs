use serde::Serialize;

use crate::domain::RunAccession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    pub id: String,
    pub description: String,
    pub bioprojects: Vec<String>,
    pub method: String,
    pub estimated_samples: String,
    pub tissue_types: Vec<String>,
    pub estimated_size_gb: String,
    pub search_url: String,
    pub notes: String,
}

impl DatasetDescriptor {
    pub fn size_upper_bound_gb(&self) -> Option<u64> {
        let (_, upper) = self.estimated_size_gb.split_once('-')?;
        upper.trim().parse().ok()
    }
}

struct Entry {
    id: &'static str,
    description: &'static str,
    bioprojects: &'static [&'static str],
    method: &'static str,
    estimated_samples: &'static str,
    tissue_types: &'static [&'static str],
    estimated_size_gb: &'static str,
    search_url: &'static str,
    notes: &'static str,
}

const DATASETS: &[Entry] = &[
    Entry {
        id: "wgbs_roberts",
        description: "Roberts Lab WGBS Studies",
        bioprojects: &["PRJNA316216", "PRJNA394801"],
        method: "WGBS",
        estimated_samples: "30-50",
        tissue_types: &["gonad", "gill", "mantle", "digestive_gland"],
        estimated_size_gb: "200-400",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=roberts+crassostrea+bisulfite",
        notes: "High-quality WGBS from University of Washington Roberts Lab",
    },
    Entry {
        id: "wgbs_ocean_acidification",
        description: "Ocean Acidification Methylation Study",
        bioprojects: &["PRJNA394801", "PRJNA316216"],
        method: "WGBS",
        estimated_samples: "20-30",
        tissue_types: &["gill", "mantle"],
        estimated_size_gb: "150-250",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=crassostrea+pH+methylation",
        notes: "DNA methylation response to ocean acidification",
    },
    Entry {
        id: "rrbs_developmental",
        description: "Developmental Methylation Studies",
        bioprojects: &["PRJNA486983", "PRJNA273482"],
        method: "RRBS",
        estimated_samples: "25-35",
        tissue_types: &["gonad", "larvae", "spat"],
        estimated_size_gb: "50-100",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=crassostrea+RRBS",
        notes: "RRBS during oyster development and reproduction",
    },
    Entry {
        id: "rrbs_environmental_stress",
        description: "Environmental Stress RRBS",
        bioprojects: &["PRJNA506631", "PRJNA413624"],
        method: "RRBS",
        estimated_samples: "20-30",
        tissue_types: &["various_adult_tissues"],
        estimated_size_gb: "40-80",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=crassostrea+stress+methylation",
        notes: "Methylation changes under environmental stress",
    },
    Entry {
        id: "medip_seq",
        description: "Genome-wide Methylation Profiling",
        bioprojects: &["PRJNA348937", "PRJNA394425"],
        method: "MeDIP-seq",
        estimated_samples: "15-25",
        tissue_types: &["adult_tissues"],
        estimated_size_gb: "30-60",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=crassostrea+MeDIP",
        notes: "MeDIP-seq for genome-wide methylation patterns",
    },
    Entry {
        id: "targeted_bisulfite",
        description: "Gene-specific Methylation Studies",
        bioprojects: &["PRJNA311096", "PRJNA381456"],
        method: "Targeted Bisulfite",
        estimated_samples: "20-40",
        tissue_types: &["multiple_tissue_types"],
        estimated_size_gb: "10-30",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=crassostrea+targeted+bisulfite",
        notes: "Targeted analysis of specific gene regions",
    },
    Entry {
        id: "magallana_recent",
        description: "Recent Magallana gigas Studies",
        bioprojects: &["PRJNA725689", "PRJNA688412"],
        method: "Mixed methods",
        estimated_samples: "15-25",
        tissue_types: &["gonad", "gill", "mantle"],
        estimated_size_gb: "100-200",
        search_url: "https://www.ncbi.nlm.nih.gov/sra/?term=magallana+methylation",
        notes: "Studies using updated Magallana gigas nomenclature",
    },
];

// Demonstration runs per bioproject. Real discovery goes through Entrez.
const EXAMPLE_RUNS: &[(&str, &[&str])] = &[
    ("PRJNA316216", &["SRR4341274", "SRR4341275", "SRR4341276"]),
    ("PRJNA394801", &["SRR5877947", "SRR5877948", "SRR5877949"]),
    ("PRJNA486983", &["SRR7951165", "SRR7951166", "SRR7951167"]),
    ("PRJNA273482", &["SRR1734651", "SRR1734652", "SRR1734653"]),
    ("PRJNA506631", &["SRR8278144", "SRR8278145", "SRR8278146"]),
    ("PRJNA413624", &["SRR6341890", "SRR6341891", "SRR6341892"]),
    ("PRJNA348937", &["SRR4125567", "SRR4125568", "SRR4125569"]),
    ("PRJNA394425", &["SRR5877950", "SRR5877951", "SRR5877952"]),
    ("PRJNA311096", &["SRR3146589", "SRR3146590", "SRR3146591"]),
    ("PRJNA381456", &["SRR5367898", "SRR5367899", "SRR5367900"]),
    ("PRJNA725689", &["SRR14048801", "SRR14048802", "SRR14048803"]),
    ("PRJNA688412", &["SRR13143456", "SRR13143457", "SRR13143458"]),
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    datasets: Vec<DatasetDescriptor>,
    example_runs: Vec<(String, Vec<RunAccession>)>,
}

impl DatasetRegistry {
    pub fn builtin() -> Self {
        let datasets = DATASETS
            .iter()
            .map(|entry| DatasetDescriptor {
                id: entry.id.to_string(),
                description: entry.description.to_string(),
                bioprojects: owned(entry.bioprojects),
                method: entry.method.to_string(),
                estimated_samples: entry.estimated_samples.to_string(),
                tissue_types: owned(entry.tissue_types),
                estimated_size_gb: entry.estimated_size_gb.to_string(),
                search_url: entry.search_url.to_string(),
                notes: entry.notes.to_string(),
            })
            .collect();
        let example_runs = EXAMPLE_RUNS
            .iter()
            .map(|(bioproject, runs)| {
                let runs = runs.iter().filter_map(|run| run.parse().ok()).collect();
                (bioproject.to_string(), runs)
            })
            .collect();
        Self::new(datasets, example_runs)
    }

    pub fn new(
        datasets: Vec<DatasetDescriptor>,
        example_runs: Vec<(String, Vec<RunAccession>)>,
    ) -> Self {
        Self {
            datasets,
            example_runs,
        }
    }

    pub fn lookup(&self, id: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|dataset| dataset.id == id)
    }

    pub fn list_all(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    pub fn example_runs(&self, bioproject: &str) -> Vec<RunAccession> {
        self.example_runs
            .iter()
            .find(|(key, _)| key == bioproject)
            .map(|(_, runs)| runs.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_keeps_declaration_order() {
        let registry = DatasetRegistry::builtin();
        let ids: Vec<&str> = registry
            .list_all()
            .iter()
            .map(|dataset| dataset.id.as_str())
            .collect();
        assert_eq!(ids.len(), 7);
        assert_eq!(ids[0], "wgbs_roberts");
        assert_eq!(ids[6], "magallana_recent");
    }

    #[test]
    fn every_bioproject_has_example_runs() {
        let registry = DatasetRegistry::builtin();
        for dataset in registry.list_all() {
            for bioproject in &dataset.bioprojects {
                assert_eq!(registry.example_runs(bioproject).len(), 3, "{bioproject}");
            }
        }
    }

    #[test]
    fn size_upper_bound() {
        let registry = DatasetRegistry::builtin();
        let roberts = registry.lookup("wgbs_roberts").unwrap();
        assert_eq!(roberts.size_upper_bound_gb(), Some(400));

        let mut broken = roberts.clone();
        broken.estimated_size_gb = "unknown".to_string();
        assert_eq!(broken.size_upper_bound_gb(), None);
    }
}
