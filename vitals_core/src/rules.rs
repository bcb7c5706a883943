//! Advisory rule families.
//!
//! Each family reads only the snapshot and the thresholds and returns
//! exactly one advisory. Absent data yields a "how to fix it" advisory,
//! and a met goal yields a low-priority confirmation, so no family ever
//! returns nothing. Non-finite snapshot fields are reported as
//! `Error::RuleFailure` for the engine to isolate.

use crate::config::{HydrationConfig, ThresholdConfig};
use crate::{Advisory, Error, HealthSnapshot, Priority, Result, RuleFamily};

/// Parameters shared by all rule families
#[derive(Clone, Debug, Default)]
pub struct RuleContext {
    pub hydration: HydrationConfig,
    pub thresholds: ThresholdConfig,
}

/// Signature every rule family implements
pub type RuleFn = fn(&HealthSnapshot, &RuleContext) -> Result<Advisory>;

/// The fixed evaluation order of rule families
pub fn default_rules() -> Vec<(RuleFamily, RuleFn)> {
    vec![
        (RuleFamily::Hydration, hydration as RuleFn),
        (RuleFamily::Sleep, sleep as RuleFn),
        (RuleFamily::Activity, activity as RuleFn),
        (RuleFamily::Bmi, bmi as RuleFn),
        (RuleFamily::Nutrition, nutrition as RuleFn),
        (RuleFamily::Balance, balance as RuleFn),
    ]
}

fn finite(family: RuleFamily, field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::RuleFailure {
            family,
            reason: format!("{} is not finite ({})", field, value),
        })
    }
}

/// Hydration: compare today's intake with the target
///
/// Reaching the target exactly counts as met.
pub fn hydration(snapshot: &HealthSnapshot, ctx: &RuleContext) -> Result<Advisory> {
    let family = RuleFamily::Hydration;
    let actual = finite(family, "hydration_actual_l", snapshot.hydration_actual_l)?;
    let target = finite(family, "hydration_target_l", snapshot.hydration_target_l)?;

    if actual < target {
        // Both inputs carry 2 decimals, so the shortfall is a whole number of millilitres
        let deficit_ml = ((target - actual) * 1000.0).round();
        let glasses = (deficit_ml / ctx.hydration.glass_ml).ceil() as u32;
        Ok(Advisory::new(
            "hydration_low",
            family,
            Priority::High,
            "💧",
            format!(
                "You've had {:.2} L of {:.2} L today. Drink about {} more glass{} of water.",
                actual,
                target,
                glasses,
                if glasses == 1 { "" } else { "es" }
            ),
        ))
    } else {
        Ok(Advisory::new(
            "hydration_met",
            family,
            Priority::Low,
            "💧",
            format!("Hydration goal reached: {:.2} L of {:.2} L. Keep it steady.", actual, target),
        ))
    }
}

/// Sleep: judge the most recent completed session
pub fn sleep(snapshot: &HealthSnapshot, ctx: &RuleContext) -> Result<Advisory> {
    let family = RuleFamily::Sleep;
    let t = &ctx.thresholds;

    let Some(hours) = snapshot.sleep_hours else {
        return Ok(Advisory::new(
            "sleep_missing",
            family,
            Priority::Medium,
            "😴",
            "No sleep recorded yet. Track your sleep tonight to get sleep insights.",
        ));
    };
    let hours = finite(family, "sleep_hours", hours)?;

    let advisory = if hours < t.sleep_short_hours {
        Advisory::new(
            "sleep_short",
            family,
            Priority::High,
            "😴",
            format!(
                "Only {:.1} h of sleep last time. Aim for at least {:.0} h tonight.",
                hours, t.sleep_min_hours
            ),
        )
    } else if hours < t.sleep_min_hours {
        Advisory::new(
            "sleep_fair",
            family,
            Priority::Medium,
            "😴",
            format!(
                "{:.1} h of sleep is a little under the {:.0}-{:.0} h range. Try an earlier bedtime.",
                hours, t.sleep_min_hours, t.sleep_max_hours
            ),
        )
    } else if hours > t.sleep_max_hours {
        Advisory::new(
            "sleep_long",
            family,
            Priority::Medium,
            "😴",
            format!(
                "{:.1} h of sleep is above {:.0} h. A consistent wake time can help.",
                hours, t.sleep_max_hours
            ),
        )
    } else {
        Advisory::new(
            "sleep_good",
            family,
            Priority::Low,
            "😴",
            format!("{:.1} h of sleep. Nicely within the recommended range.", hours),
        )
    };
    Ok(advisory)
}

/// Activity: today's burned calories
pub fn activity(snapshot: &HealthSnapshot, ctx: &RuleContext) -> Result<Advisory> {
    let family = RuleFamily::Activity;
    let t = &ctx.thresholds;
    let burned = finite(family, "burned_calories", snapshot.burned_calories)?;

    let advisory = if burned <= 0.0 {
        Advisory::new(
            "activity_none",
            family,
            Priority::Medium,
            "🔥",
            "No activity logged today. Log a workout or take a brisk walk.",
        )
    } else if burned < t.activity_low_kcal {
        Advisory::new(
            "activity_low",
            family,
            Priority::Medium,
            "🔥",
            format!(
                "{:.0} kcal burned so far. A 20-minute walk would get you past {:.0} kcal.",
                burned, t.activity_low_kcal
            ),
        )
    } else if burned < t.activity_goal_kcal {
        Advisory::new(
            "activity_moderate",
            family,
            Priority::Low,
            "🔥",
            format!(
                "{:.0} kcal burned. {:.0} kcal more reaches today's goal.",
                burned,
                t.activity_goal_kcal - burned
            ),
        )
    } else {
        Advisory::new(
            "activity_goal_met",
            family,
            Priority::Low,
            "🔥",
            format!("{:.0} kcal burned today. Great work, remember to recover.", burned),
        )
    };
    Ok(advisory)
}

/// BMI: classify into standard bands
pub fn bmi(snapshot: &HealthSnapshot, ctx: &RuleContext) -> Result<Advisory> {
    let family = RuleFamily::Bmi;
    let t = &ctx.thresholds;

    let Some(bmi) = snapshot.bmi else {
        return Ok(Advisory::new(
            "bmi_missing",
            family,
            Priority::Medium,
            "⚖️",
            "Add your height and weight to your profile to see BMI guidance.",
        ));
    };
    let bmi = finite(family, "bmi", bmi)?;

    let advisory = if bmi < t.bmi_underweight {
        Advisory::new(
            "bmi_underweight",
            family,
            Priority::High,
            "⚖️",
            format!(
                "BMI {:.2} is below {:.1}. Consider talking to a professional about nutrition.",
                bmi, t.bmi_underweight
            ),
        )
    } else if bmi <= t.bmi_healthy_max {
        Advisory::new(
            "bmi_healthy",
            family,
            Priority::Low,
            "⚖️",
            format!("BMI {:.2} is in the healthy range.", bmi),
        )
    } else if bmi < t.bmi_obese {
        Advisory::new(
            "bmi_overweight",
            family,
            Priority::Medium,
            "⚖️",
            format!(
                "BMI {:.2} is above the healthy range. Regular activity and balanced meals help.",
                bmi
            ),
        )
    } else {
        Advisory::new(
            "bmi_obese",
            family,
            Priority::High,
            "⚖️",
            format!(
                "BMI {:.2} is in the obese range. A check-in with your doctor is worthwhile.",
                bmi
            ),
        )
    };
    Ok(advisory)
}

/// Nutrition: today's logged intake
pub fn nutrition(snapshot: &HealthSnapshot, ctx: &RuleContext) -> Result<Advisory> {
    let family = RuleFamily::Nutrition;
    let t = &ctx.thresholds;

    let Some(kcal) = snapshot.nutrition_total_kcal else {
        return Ok(Advisory::new(
            "nutrition_missing",
            family,
            Priority::Medium,
            "🥗",
            "No meals logged today. Log what you eat to get nutrition feedback.",
        ));
    };
    let kcal = finite(family, "nutrition_total_kcal", kcal)?;

    let advisory = if kcal < t.nutrition_low_kcal {
        Advisory::new(
            "nutrition_low",
            family,
            Priority::High,
            "🥗",
            format!(
                "Only {:.0} kcal eaten today. Make sure you're fuelling properly.",
                kcal
            ),
        )
    } else if kcal > t.nutrition_high_kcal {
        Advisory::new(
            "nutrition_high",
            family,
            Priority::Medium,
            "🥗",
            format!(
                "{:.0} kcal eaten today is above {:.0} kcal. Favour lighter meals later.",
                kcal, t.nutrition_high_kcal
            ),
        )
    } else {
        Advisory::new(
            "nutrition_ok",
            family,
            Priority::Low,
            "🥗",
            format!("{:.0} kcal eaten today. Intake looks balanced.", kcal),
        )
    };
    Ok(advisory)
}

/// Balance: intake versus burn
pub fn balance(snapshot: &HealthSnapshot, ctx: &RuleContext) -> Result<Advisory> {
    let family = RuleFamily::Balance;
    let margin = ctx.thresholds.balance_margin_kcal;
    let burned = finite(family, "burned_calories", snapshot.burned_calories)?;

    let Some(intake) = snapshot.nutrition_total_kcal else {
        return Ok(Advisory::new(
            "balance_unknown",
            family,
            Priority::Low,
            "📊",
            "Log meals and activity together to see your energy balance.",
        ));
    };
    let intake = finite(family, "nutrition_total_kcal", intake)?;
    let net = intake - burned;

    let advisory = if net > margin {
        Advisory::new(
            "balance_surplus",
            family,
            Priority::Medium,
            "📊",
            format!("Energy surplus of {:.0} kcal today. Some extra movement would even it out.", net),
        )
    } else if net < -margin {
        Advisory::new(
            "balance_deficit",
            family,
            Priority::Medium,
            "📊",
            format!(
                "Energy deficit of {:.0} kcal today. Consider a nutritious snack.",
                -net
            ),
        )
    } else {
        Advisory::new(
            "balance_even",
            family,
            Priority::Low,
            "📊",
            format!("Intake and burn are within {:.0} kcal of each other.", margin),
        )
    };
    Ok(advisory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> HealthSnapshot {
        HealthSnapshot {
            bmi: None,
            sleep_hours: None,
            burned_calories: 0.0,
            nutrition_total_kcal: None,
            hydration_actual_l: 0.0,
            hydration_target_l: 2.5,
        }
    }

    #[test]
    fn test_hydration_below_target_counts_glasses() {
        let mut s = snapshot();
        s.hydration_actual_l = 0.8;
        s.hydration_target_l = 2.31;

        let advisory = hydration(&s, &RuleContext::default()).unwrap();
        assert_eq!(advisory.id, "hydration_low");
        assert_eq!(advisory.priority, Priority::High);
        assert!(advisory.text.contains("7 more glasses"), "{}", advisory.text);
    }

    #[test]
    fn test_hydration_exact_glass_multiple_is_not_rounded_up() {
        let ctx = RuleContext::default();
        let mut s = snapshot();

        // 1.07 - 0.57 is slightly above 0.5 in binary floating point
        s.hydration_target_l = 1.07;
        s.hydration_actual_l = 0.57;
        let advisory = hydration(&s, &ctx).unwrap();
        assert!(advisory.text.contains("about 2 more glasses"), "{}", advisory.text);

        for target_cl in 100..=400_u32 {
            for glasses in 1..=4_u32 {
                let Some(actual_cl) = target_cl.checked_sub(glasses * 25) else {
                    continue;
                };
                s.hydration_target_l = f64::from(target_cl) / 100.0;
                s.hydration_actual_l = f64::from(actual_cl) / 100.0;

                let advisory = hydration(&s, &ctx).unwrap();
                let expected = format!("about {} more glass", glasses);
                assert!(
                    advisory.text.contains(&expected),
                    "target {} actual {}: {}",
                    s.hydration_target_l,
                    s.hydration_actual_l,
                    advisory.text
                );
            }
        }
    }

    #[test]
    fn test_hydration_equal_to_target_is_met() {
        let mut s = snapshot();
        s.hydration_actual_l = 2.5;

        let advisory = hydration(&s, &RuleContext::default()).unwrap();
        assert_eq!(advisory.id, "hydration_met");
        assert_eq!(advisory.priority, Priority::Low);
    }

    #[test]
    fn test_hydration_single_glass_wording() {
        let mut s = snapshot();
        s.hydration_actual_l = 2.3;

        let advisory = hydration(&s, &RuleContext::default()).unwrap();
        assert!(advisory.text.contains("1 more glass of water"), "{}", advisory.text);
    }

    #[test]
    fn test_sleep_branches() {
        let ctx = RuleContext::default();
        let mut s = snapshot();

        assert_eq!(sleep(&s, &ctx).unwrap().id, "sleep_missing");
        assert_eq!(sleep(&s, &ctx).unwrap().priority, Priority::Medium);

        s.sleep_hours = Some(4.5);
        assert_eq!(sleep(&s, &ctx).unwrap().id, "sleep_short");
        s.sleep_hours = Some(6.5);
        assert_eq!(sleep(&s, &ctx).unwrap().id, "sleep_fair");
        s.sleep_hours = Some(8.0);
        assert_eq!(sleep(&s, &ctx).unwrap().id, "sleep_good");
        s.sleep_hours = Some(10.5);
        assert_eq!(sleep(&s, &ctx).unwrap().id, "sleep_long");
    }

    #[test]
    fn test_activity_branches() {
        let ctx = RuleContext::default();
        let mut s = snapshot();

        assert_eq!(activity(&s, &ctx).unwrap().id, "activity_none");
        s.burned_calories = 120.0;
        assert_eq!(activity(&s, &ctx).unwrap().id, "activity_low");
        s.burned_calories = 320.0;
        assert_eq!(activity(&s, &ctx).unwrap().id, "activity_moderate");
        s.burned_calories = 640.0;
        assert_eq!(activity(&s, &ctx).unwrap().id, "activity_goal_met");
    }

    #[test]
    fn test_bmi_branches() {
        let ctx = RuleContext::default();
        let mut s = snapshot();

        assert_eq!(bmi(&s, &ctx).unwrap().id, "bmi_missing");
        s.bmi = Some(17.0);
        assert_eq!(bmi(&s, &ctx).unwrap().priority, Priority::High);
        s.bmi = Some(22.86);
        let healthy = bmi(&s, &ctx).unwrap();
        assert_eq!(healthy.id, "bmi_healthy");
        assert_eq!(healthy.priority, Priority::Low);
        s.bmi = Some(24.9);
        assert_eq!(bmi(&s, &ctx).unwrap().id, "bmi_healthy");
        s.bmi = Some(27.0);
        assert_eq!(bmi(&s, &ctx).unwrap().id, "bmi_overweight");
        s.bmi = Some(31.0);
        assert_eq!(bmi(&s, &ctx).unwrap().id, "bmi_obese");
    }

    #[test]
    fn test_nutrition_and_balance() {
        let ctx = RuleContext::default();
        let mut s = snapshot();

        assert_eq!(nutrition(&s, &ctx).unwrap().id, "nutrition_missing");
        assert_eq!(balance(&s, &ctx).unwrap().id, "balance_unknown");

        s.nutrition_total_kcal = Some(2200.0);
        s.burned_calories = 400.0;
        assert_eq!(nutrition(&s, &ctx).unwrap().id, "nutrition_ok");
        assert_eq!(balance(&s, &ctx).unwrap().id, "balance_surplus");

        s.burned_calories = 2000.0;
        assert_eq!(balance(&s, &ctx).unwrap().id, "balance_even");

        s.nutrition_total_kcal = Some(900.0);
        assert_eq!(nutrition(&s, &ctx).unwrap().id, "nutrition_low");
        assert_eq!(balance(&s, &ctx).unwrap().id, "balance_deficit");
    }

    #[test]
    fn test_non_finite_field_is_rule_failure() {
        let mut s = snapshot();
        s.hydration_actual_l = f64::NAN;

        let err = hydration(&s, &RuleContext::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::RuleFailure {
                family: RuleFamily::Hydration,
                ..
            }
        ));
    }

    #[test]
    fn test_every_family_emits_for_empty_snapshot() {
        let ctx = RuleContext::default();
        let s = snapshot();
        for (family, rule) in default_rules() {
            let advisory = rule(&s, &ctx).unwrap();
            assert_eq!(advisory.family, family);
        }
    }
}
