//! Static care guidance per diagnosis label.

use crate::labels::Language;
use serde::Serialize;

/// The categories the bundled model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Eggs,
    Unrelated,
    DamagedFruit,
    HealthyFruit,
    Pest,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Eggs,
        Category::Unrelated,
        Category::DamagedFruit,
        Category::HealthyFruit,
        Category::Pest,
    ];

    pub fn name(self, lang: Language) -> &'static str {
        match self {
            Category::Eggs => lang.tr("Huevos", "Eggs"),
            Category::Unrelated => lang.tr("No Relacionado", "Unrelated"),
            Category::DamagedFruit => lang.tr("Palta Dañada", "Damaged Fruit"),
            Category::HealthyFruit => lang.tr("Palta Sana", "Healthy Fruit"),
            Category::Pest => lang.tr("Plaga", "Pest"),
        }
    }

    /// Accepts the Spanish or English name, ignoring case and surrounding
    /// whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let needle = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| {
            [Language::Spanish, Language::English]
                .iter()
                .any(|&l| c.name(l).to_lowercase() == needle)
        })
    }
}

/// Everything shown next to a diagnosis. Unknown labels yield empty fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CareGuide {
    pub description: &'static str,
    pub care_instructions: &'static str,
    pub severity: &'static str,
    pub recommendations: &'static str,
}

impl CareGuide {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.care_instructions.is_empty()
            && self.severity.is_empty()
            && self.recommendations.is_empty()
    }
}

pub fn care_guide(label: &str, lang: Language) -> CareGuide {
    match Category::from_label(label) {
        Some(category) => guide_for(category, lang),
        None => CareGuide::default(),
    }
}

pub fn guide_for(category: Category, lang: Language) -> CareGuide {
    match lang {
        Language::Spanish => spanish(category),
        Language::English => english(category),
    }
}

fn spanish(category: Category) -> CareGuide {
    match category {
        Category::Pest => CareGuide {
            description: "Se ha detectado la presencia de plagas (insectos) en la planta. \
                Esto incluye trips, chinches u otros insectos que pueden dañar hojas, tallos y frutos.",
            care_instructions: "- TRATAMIENTO INMEDIATO:\n\
                • Aplicar insecticida orgánico (aceite de neem al 2%)\n\
                • Realizar fumigación temprano en la mañana o al atardecer\n\
                • Repetir aplicación cada 7-10 días por 3 semanas\n\
                • Monitorear plantas vecinas\n\
                • Mejorar ventilación del cultivo",
            severity: "ALTO - Requiere acción inmediata",
            recommendations: "- IMPORTANTE:\n\
                • Registrar ubicación de plantas afectadas\n\
                • Verificar condiciones climáticas favorables para plagas\n\
                • Considerar trampas cromáticas (amarillas o azules)\n\
                • Consultar a un ingeniero agrónomo si la infestación persiste\n\
                • Documentar con fotos para seguimiento",
        },
        Category::Eggs => CareGuide {
            description: "Se han identificado huevecillos de plagas. Estos son indicadores tempranos \
                de una posible infestación futura. Es crucial actuar rápidamente.",
            care_instructions: "- PREVENCIÓN Y CONTROL:\n\
                • Remover manualmente los huevos encontrados\n\
                • Aplicar jabón potásico diluido (1-2%)\n\
                • Inspeccionar envés de hojas semanalmente\n\
                • Introducir enemigos naturales (crisopas, mariquitas)\n\
                • Evitar exceso de nitrógeno en fertilización",
            severity: "MEDIO - Actuar en 24-48 horas",
            recommendations: "- SEGUIMIENTO:\n\
                • Marcar las plantas afectadas\n\
                • Revisar cada 2-3 días\n\
                • Fotografiar para comparar evolución\n\
                • Implementar control biológico preventivo\n\
                • Capacitar al personal en identificación de huevos",
        },
        Category::HealthyFruit => CareGuide {
            description: "¡Excelente! El fruto se encuentra en perfecto estado. \
                No se detectan signos de plagas ni daños.",
            care_instructions: "- MANTENIMIENTO PREVENTIVO:\n\
                • Continuar con programa de monitoreo semanal\n\
                • Mantener buenas prácticas de riego\n\
                • Aplicar fertilización balanceada\n\
                • Limpiar malezas alrededor del cultivo\n\
                • Inspección visual cada 3-4 días",
            severity: "NINGUNO - Continuar monitoreo",
            recommendations: "- BUENAS PRÁCTICAS:\n\
                • Mantener registro fotográfico del estado sano\n\
                • Continuar con el calendario de fertilización\n\
                • Revisar sistema de riego periódicamente\n\
                • Realizar poda sanitaria cuando sea necesario\n\
                • Mantener limpio el área de cultivo",
        },
        Category::DamagedFruit => CareGuide {
            description: "El fruto presenta daños visibles, posiblemente causados por plagas, \
                enfermedades o factores ambientales.",
            care_instructions: "- MANEJO DEL FRUTO DAÑADO:\n\
                • Remover frutos severamente dañados\n\
                • Evaluar causa del daño (plaga, hongo, mecánico)\n\
                • Si es por plaga: aplicar tratamiento específico\n\
                • Mejorar manejo cultural (poda, ventilación)\n\
                • Considerar cosecha anticipada si es viable",
            severity: "MEDIO-ALTO - Evaluar y actuar",
            recommendations: "- ANÁLISIS:\n\
                • Determinar si el daño es progresivo o detenido\n\
                • Evaluar porcentaje de frutos afectados\n\
                • Revisar historial de tratamientos previos\n\
                • Tomar muestras si hay sospecha de enfermedad\n\
                • Ajustar calendario de aplicaciones preventivas",
        },
        Category::Unrelated => CareGuide {
            description: "La imagen no corresponde a paltas ni plagas relacionadas. \
                Por favor, sube una imagen del cultivo de palta para análisis.",
            care_instructions: "- ACCIÓN REQUERIDA:\n\
                • Verificar que la imagen sea del cultivo de palta\n\
                • Asegurarse de enfocar en frutos, hojas o plagas\n\
                • Evitar fondos con otros objetos o personas\n\
                • Tomar fotos con buena iluminación\n\
                • Intentar nuevamente con imagen apropiada",
            severity: "N/A - Imagen no válida",
            recommendations: "- RECOMENDACIONES:\n\
                • Usar el sistema solo para análisis de paltas\n\
                • Tomar fotos cercanas del área a analizar\n\
                • Evitar incluir objetos ajenos al cultivo\n\
                • Asegurar buena iluminación natural\n\
                • Si persiste, consultar con soporte técnico",
        },
    }
}

fn english(category: Category) -> CareGuide {
    match category {
        Category::Pest => CareGuide {
            description: "Pests (insects) were detected on the plant. This includes thrips, \
                stink bugs and other insects that damage leaves, stems and fruit.",
            care_instructions: "- IMMEDIATE TREATMENT:\n\
                • Apply an organic insecticide (2% neem oil)\n\
                • Spray early in the morning or at dusk\n\
                • Repeat every 7-10 days for 3 weeks\n\
                • Monitor neighbouring plants\n\
                • Improve airflow through the orchard",
            severity: "HIGH - Act immediately",
            recommendations: "- IMPORTANT:\n\
                • Record where the affected plants are\n\
                • Check for weather that favours pests\n\
                • Consider coloured sticky traps (yellow or blue)\n\
                • Consult an agronomist if the infestation persists\n\
                • Keep photos to track progress",
        },
        Category::Eggs => CareGuide {
            description: "Pest eggs were identified. They are an early sign of a possible \
                future infestation. Acting quickly is crucial.",
            care_instructions: "- PREVENTION AND CONTROL:\n\
                • Remove the eggs found by hand\n\
                • Apply diluted potassium soap (1-2%)\n\
                • Inspect leaf undersides weekly\n\
                • Introduce natural enemies (lacewings, ladybirds)\n\
                • Avoid excess nitrogen when fertilizing",
            severity: "MEDIUM - Act within 24-48 hours",
            recommendations: "- FOLLOW-UP:\n\
                • Mark the affected plants\n\
                • Check again every 2-3 days\n\
                • Photograph to compare progress\n\
                • Set up preventive biological control\n\
                • Train staff to recognise eggs",
        },
        Category::HealthyFruit => CareGuide {
            description: "Excellent! The fruit is in perfect condition. \
                No signs of pests or damage were found.",
            care_instructions: "- PREVENTIVE MAINTENANCE:\n\
                • Keep up the weekly monitoring schedule\n\
                • Maintain good irrigation practice\n\
                • Apply balanced fertilization\n\
                • Clear weeds around the crop\n\
                • Inspect visually every 3-4 days",
            severity: "NONE - Keep monitoring",
            recommendations: "- GOOD PRACTICE:\n\
                • Keep a photo log of the healthy state\n\
                • Stay on the fertilization calendar\n\
                • Check the irrigation system periodically\n\
                • Prune for sanitation when needed\n\
                • Keep the growing area clean",
        },
        Category::DamagedFruit => CareGuide {
            description: "The fruit shows visible damage, possibly caused by pests, \
                disease or environmental factors.",
            care_instructions: "- HANDLING DAMAGED FRUIT:\n\
                • Remove severely damaged fruit\n\
                • Determine the cause (pest, fungus, mechanical)\n\
                • If caused by pests: apply a targeted treatment\n\
                • Improve cultural management (pruning, airflow)\n\
                • Consider an early harvest if viable",
            severity: "MEDIUM-HIGH - Assess and act",
            recommendations: "- ANALYSIS:\n\
                • Determine whether the damage is spreading or stopped\n\
                • Estimate the share of affected fruit\n\
                • Review previous treatments\n\
                • Take samples if disease is suspected\n\
                • Adjust the preventive spraying calendar",
        },
        Category::Unrelated => CareGuide {
            description: "The image does not show avocados or related pests. \
                Please upload an image of the avocado crop for analysis.",
            care_instructions: "- ACTION REQUIRED:\n\
                • Make sure the image shows the avocado crop\n\
                • Focus on fruit, leaves or pests\n\
                • Avoid backgrounds with other objects or people\n\
                • Take photos in good light\n\
                • Try again with a suitable image",
            severity: "N/A - Invalid image",
            recommendations: "- RECOMMENDATIONS:\n\
                • Use the system only for avocado analysis\n\
                • Take close-up photos of the area to analyse\n\
                • Leave unrelated objects out of frame\n\
                • Ensure good natural lighting\n\
                • If the problem persists, contact support",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_guidance_in_both_languages() {
        for category in Category::ALL {
            for lang in [Language::Spanish, Language::English] {
                let guide = guide_for(category, lang);
                assert!(!guide.description.is_empty());
                assert!(!guide.care_instructions.is_empty());
                assert!(!guide.severity.is_empty());
                assert!(!guide.recommendations.is_empty());
            }
        }
    }

    #[test]
    fn lookup_accepts_either_language_name() {
        assert_eq!(Category::from_label("Plaga"), Some(Category::Pest));
        assert_eq!(Category::from_label("pest"), Some(Category::Pest));
        assert_eq!(Category::from_label(" Palta Dañada "), Some(Category::DamagedFruit));
        assert_eq!(Category::from_label("Healthy Fruit"), Some(Category::HealthyFruit));
    }

    #[test]
    fn spanish_label_with_english_guide() {
        let guide = care_guide("Plaga", Language::English);
        assert_eq!(guide.severity, "HIGH - Act immediately");
    }

    #[test]
    fn unknown_label_yields_empty_guide() {
        let guide = care_guide("Mildew", Language::Spanish);
        assert!(guide.is_empty());
        assert_eq!(guide.description, "");
    }

    #[test]
    fn severity_matches_deployment_text() {
        assert_eq!(
            care_guide("Huevos", Language::Spanish).severity,
            "MEDIO - Actuar en 24-48 horas"
        );
    }
}
