use ahash::AHashSet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RewriteError;
use crate::io::population::{IOPerson, IOPlanElement};

/// What happened to a single person. Anything but `Reassigned` and
/// `Remapped` leaves the person untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Vehicle instance was selected, mapping entry added and plans rewritten.
    Reassigned,
    /// Vehicle type matched the exclusion set, person moved to the fallback category.
    Remapped,
    /// Vehicle type matched the exclusion set and no fallback is configured.
    Excluded,
    /// No usable `vehicles` mapping for the source category.
    Skipped,
    /// Candidate, but not selected.
    Unchanged,
}

impl RewriteOutcome {
    pub fn changes_person(&self) -> bool {
        matches!(self, RewriteOutcome::Reassigned | RewriteOutcome::Remapped)
    }
}

/// Blocks persons whose `vehicleTypes` annotation names one of the given
/// concrete vehicle types (e.g. special fleet models). Matching persons are
/// moved to the fallback category instead, or left alone if there is none.
#[derive(Debug, Default, Clone)]
pub struct ExclusionFilter {
    pub blocked_types: AHashSet<String>,
    pub fallback: Option<String>,
}

impl ExclusionFilter {
    pub fn new(blocked_types: Vec<String>, fallback: Option<String>) -> Self {
        ExclusionFilter {
            blocked_types: blocked_types.into_iter().collect(),
            fallback,
        }
    }

    fn matches(&self, types: &serde_json::Map<String, Value>) -> bool {
        types
            .values()
            .filter_map(Value::as_str)
            .any(|t| self.blocked_types.contains(t))
    }
}

pub struct PlanRewriter {
    source: String,
    target: String,
    selected: AHashSet<String>,
    exclusion: ExclusionFilter,
}

impl PlanRewriter {
    pub fn new(
        source: String,
        target: String,
        selected: AHashSet<String>,
        exclusion: ExclusionFilter,
    ) -> Self {
        PlanRewriter {
            source,
            target,
            selected,
            exclusion,
        }
    }

    /// Applies the reassignment to one person. The `vehicles` mapping and
    /// all plan references change together or not at all; applying this
    /// twice with the same selection yields the same person.
    pub fn rewrite_person(&self, person: &mut IOPerson) -> Result<RewriteOutcome, RewriteError> {
        // exclusion wins over selection
        if let Some(types) = person.vehicle_types()? {
            if self.exclusion.matches(&types) {
                return match self.exclusion.fallback.as_deref() {
                    Some(fallback) => {
                        self.remap_to_fallback(person, types, fallback)?;
                        Ok(RewriteOutcome::Remapped)
                    }
                    None => Ok(RewriteOutcome::Excluded),
                };
            }
        }

        let Some(mut mapping) = person.vehicle_mapping()? else {
            debug!("Person {} has no vehicles attribute", person.id);
            return Ok(RewriteOutcome::Skipped);
        };
        let Some(instance) = mapping
            .get(&self.source)
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            debug!(
                "Person {} has no '{}' entry in its vehicles attribute",
                person.id, self.source
            );
            return Ok(RewriteOutcome::Skipped);
        };

        if !self.selected.contains(instance.as_str()) {
            return Ok(RewriteOutcome::Unchanged);
        }

        let Some(target_instance) = swap_category_suffix(&instance, &self.source, &self.target)
        else {
            warn!(
                "Person {}: vehicle id '{}' does not follow the <prefix>_{} convention, leaving person unchanged",
                person.id, instance, self.source
            );
            return Ok(RewriteOutcome::Skipped);
        };

        if !mapping.contains_key(&self.target) {
            mapping.insert(
                self.target.clone(),
                Value::String(target_instance.clone()),
            );
            person.set_vehicle_mapping(&mapping)?;
        }
        rewrite_plans(
            person,
            &self.source,
            &self.target,
            Some(&instance),
            Some(&target_instance),
        );
        Ok(RewriteOutcome::Reassigned)
    }

    fn remap_to_fallback(
        &self,
        person: &mut IOPerson,
        mut types: serde_json::Map<String, Value>,
        fallback: &str,
    ) -> Result<(), RewriteError> {
        if let Some(veh_type) = types.remove(&self.source) {
            types.insert(fallback.to_string(), veh_type);
            person.set_vehicle_types(&types)?;
        }

        let instance = person
            .vehicle_mapping()?
            .and_then(|m| m.get(&self.source).and_then(Value::as_str).map(str::to_string));
        let target_instance = instance
            .as_deref()
            .and_then(|i| swap_category_suffix(i, &self.source, fallback));

        rewrite_plans(
            person,
            &self.source,
            fallback,
            instance.as_deref(),
            target_instance.as_deref(),
        );
        Ok(())
    }
}

/// Derives the target vehicle instance id by the `<prefix>_<category>`
/// naming convention: `p42_car` -> `p42_microcar`. Returns `None` if the id
/// does not carry the source suffix.
pub fn swap_category_suffix(instance: &str, from: &str, to: &str) -> Option<String> {
    let suffix = format!("_{from}");
    instance
        .strip_suffix(suffix.as_str())
        .map(|prefix| format!("{prefix}_{to}"))
}

/// Rewrites every reference to the source category inside the person's
/// plans: leg modes, leg attribute values such as `routingMode`, route
/// vehicle references and `<source> interaction` activity types. Fields are
/// matched exactly, never by substring.
fn rewrite_plans(
    person: &mut IOPerson,
    from: &str,
    to: &str,
    from_instance: Option<&str>,
    to_instance: Option<&str>,
) {
    let interaction_from = format!("{from} interaction");
    let interaction_to = format!("{to} interaction");

    for plan in &mut person.plans {
        for element in &mut plan.elements {
            match element {
                IOPlanElement::Activity(activity) => {
                    if activity.r#type == interaction_from {
                        activity.r#type = interaction_to.clone();
                    }
                }
                IOPlanElement::Leg(leg) => {
                    if leg.mode == from {
                        leg.mode = to.to_string();
                    }
                    if let Some(attrs) = leg.attributes.as_mut() {
                        for attr in &mut attrs.attributes {
                            if attr.value == from {
                                attr.value = to.to_string();
                            }
                        }
                    }
                    if let Some(route) = leg.route.as_mut() {
                        if let (Some(from_veh), Some(to_veh)) = (from_instance, to_instance) {
                            if route.vehicle.as_deref() == Some(from_veh) {
                                route.vehicle = Some(to_veh.to_string());
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quick_xml::de::from_str;
    use serde_json::Value;

    use crate::io::population::{IOPerson, IOPlanElement};
    use crate::rewriter::{
        swap_category_suffix, ExclusionFilter, PlanRewriter, RewriteOutcome,
    };

    fn car_person(id: &str, veh_types: Option<&str>) -> IOPerson {
        let types_attr = veh_types
            .map(|t| {
                format!(
                    "<attribute name=\"vehicleTypes\" class=\"org.matsim.vehicles.PersonVehicleTypes\">{t}</attribute>"
                )
            })
            .unwrap_or_default();
        let xml = format!(
            "<person id=\"{id}\">
                <attributes>
                    <attribute name=\"vehicles\" class=\"org.matsim.vehicles.PersonVehicles\">{{\"car\":\"{id}_car\"}}</attribute>
                    {types_attr}
                </attributes>
                <plan selected=\"yes\">
                    <activity type=\"home\" link=\"l1\" x=\"0.0\" y=\"0.0\" end_time=\"07:00:00\">
                    </activity>
                    <leg mode=\"car\">
                        <attributes>
                            <attribute name=\"routingMode\" class=\"java.lang.String\">car</attribute>
                        </attributes>
                        <route type=\"links\" start_link=\"l1\" end_link=\"l2\" trav_time=\"00:10:00\" distance=\"2500.0\" vehicleRefId=\"{id}_car\">l1 l2</route>
                    </leg>
                    <activity type=\"car interaction\" link=\"l2\" x=\"100.0\" y=\"0.0\" max_dur=\"00:00:01\">
                    </activity>
                    <activity type=\"work\" link=\"l2\" x=\"100.0\" y=\"0.0\">
                    </activity>
                </plan>
            </person>"
        );
        from_str(&xml).unwrap()
    }

    fn rewriter(selected: &[&str], exclusion: ExclusionFilter) -> PlanRewriter {
        PlanRewriter::new(
            String::from("car"),
            String::from("microcar"),
            selected.iter().map(|s| s.to_string()).collect(),
            exclusion,
        )
    }

    fn leg_modes(person: &IOPerson) -> Vec<&str> {
        person
            .plans
            .iter()
            .flat_map(|p| p.elements.iter())
            .filter_map(|e| match e {
                IOPlanElement::Leg(leg) => Some(leg.mode.as_str()),
                IOPlanElement::Activity(_) => None,
            })
            .collect()
    }

    #[test]
    fn reassigns_selected_person() {
        let mut person = car_person("p1", None);
        let rewriter = rewriter(&["p1_car"], ExclusionFilter::default());

        let outcome = rewriter.rewrite_person(&mut person).unwrap();
        assert_eq!(RewriteOutcome::Reassigned, outcome);
        assert!(outcome.changes_person());

        // mapping gained exactly the target entry
        let mapping = person.vehicle_mapping().unwrap().unwrap();
        assert_eq!(2, mapping.len());
        assert_eq!(Some("p1_car"), mapping.get("car").and_then(Value::as_str));
        assert_eq!(
            Some("p1_microcar"),
            mapping.get("microcar").and_then(Value::as_str)
        );

        // every plan reference moved along
        assert_eq!(vec!["microcar"], leg_modes(&person));
        for element in &person.plans.first().unwrap().elements {
            match element {
                IOPlanElement::Leg(leg) => {
                    assert_eq!(
                        Some("microcar"),
                        leg.attributes.as_ref().unwrap().find("routingMode")
                    );
                    assert_eq!(
                        Some(String::from("p1_microcar")),
                        leg.route.as_ref().unwrap().vehicle
                    );
                }
                IOPlanElement::Activity(activity) => {
                    assert_ne!("car interaction", activity.r#type);
                }
            }
        }
        let interactions: Vec<_> = person
            .plans
            .iter()
            .flat_map(|p| p.elements.iter())
            .filter_map(|e| match e {
                IOPlanElement::Activity(a) if a.is_interaction() => Some(a.r#type.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(vec!["microcar interaction"], interactions);
    }

    #[test]
    fn unselected_person_is_unchanged() {
        let mut person = car_person("p2", None);
        let before = person.clone();
        let rewriter = rewriter(&["p1_car"], ExclusionFilter::default());

        let outcome = rewriter.rewrite_person(&mut person).unwrap();
        assert_eq!(RewriteOutcome::Unchanged, outcome);
        assert_eq!(before, person);
    }

    #[test]
    fn person_without_vehicles_attribute_is_skipped() {
        let xml = "<person id=\"p4\">
            <plan selected=\"yes\">
                <leg mode=\"walk\">
                </leg>
            </plan>
        </person>";
        let mut person: IOPerson = from_str(xml).unwrap();
        let before = person.clone();
        let rewriter = rewriter(&["p4_car"], ExclusionFilter::default());

        assert_eq!(
            RewriteOutcome::Skipped,
            rewriter.rewrite_person(&mut person).unwrap()
        );
        assert_eq!(before, person);
    }

    #[test]
    fn unconventional_vehicle_id_is_skipped() {
        let xml = "<person id=\"p5\">
            <attributes>
                <attribute name=\"vehicles\" class=\"org.matsim.vehicles.PersonVehicles\">{\"car\":\"companyCar42\"}</attribute>
            </attributes>
            <plan selected=\"yes\">
            </plan>
        </person>";
        let mut person: IOPerson = from_str(xml).unwrap();
        let rewriter = rewriter(&["companyCar42"], ExclusionFilter::default());

        assert_eq!(
            RewriteOutcome::Skipped,
            rewriter.rewrite_person(&mut person).unwrap()
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let mut person = car_person("p1", None);
        let rewriter = rewriter(&["p1_car"], ExclusionFilter::default());

        rewriter.rewrite_person(&mut person).unwrap();
        let once = person.clone();
        rewriter.rewrite_person(&mut person).unwrap();
        assert_eq!(once, person);
    }

    #[test]
    fn exclusion_takes_precedence_over_selection() {
        let mut person = car_person("p3", Some("{\"car\":\"golf1.4\"}"));
        let exclusion = ExclusionFilter::new(
            vec![String::from("golf1.4"), String::from("vwCaddy")],
            Some(String::from("freight")),
        );
        // selected, but exclusion must win
        let rewriter = rewriter(&["p3_car"], exclusion);

        let outcome = rewriter.rewrite_person(&mut person).unwrap();
        assert_eq!(RewriteOutcome::Remapped, outcome);

        // category key moved in the annotation, type name kept
        let types = person.vehicle_types().unwrap().unwrap();
        assert!(types.get("car").is_none());
        assert_eq!(
            Some("golf1.4"),
            types.get("freight").and_then(Value::as_str)
        );

        // plans moved to the fallback, never to the target
        assert_eq!(vec!["freight"], leg_modes(&person));
        let mapping = person.vehicle_mapping().unwrap().unwrap();
        assert!(mapping.get("microcar").is_none());
    }

    #[test]
    fn exclusion_without_fallback_leaves_person_untouched() {
        let mut person = car_person("p3", Some("{\"car\":\"vwCaddy\"}"));
        let before = person.clone();
        let exclusion = ExclusionFilter::new(vec![String::from("vwCaddy")], None);
        let rewriter = rewriter(&["p3_car"], exclusion);

        assert_eq!(
            RewriteOutcome::Excluded,
            rewriter.rewrite_person(&mut person).unwrap()
        );
        assert_eq!(before, person);
    }

    #[test]
    fn remap_to_fallback_is_idempotent() {
        let mut person = car_person("p3", Some("{\"car\":\"golf1.4\"}"));
        let exclusion =
            ExclusionFilter::new(vec![String::from("golf1.4")], Some(String::from("freight")));
        let rewriter = rewriter(&[], exclusion);

        rewriter.rewrite_person(&mut person).unwrap();
        let once = person.clone();
        rewriter.rewrite_person(&mut person).unwrap();
        assert_eq!(once, person);
    }

    #[test]
    fn swap_suffix_follows_naming_convention() {
        assert_eq!(
            Some(String::from("p42_microcar")),
            swap_category_suffix("p42_car", "car", "microcar")
        );
        assert_eq!(
            Some(String::from("p1_freight")),
            swap_category_suffix("p1_car", "car", "freight")
        );
        assert_eq!(None, swap_category_suffix("p42_bike", "car", "microcar"));
        // suffix match is anchored with the separator
        assert_eq!(None, swap_category_suffix("oscar", "car", "microcar"));
    }
}
