//! Plain-text model-fit report

use crate::algorithm::logistic::FittedModel;
use crate::config::WALD_Z;
use crate::schema::OutcomeProvenance;

/// Human-readable summary of a fitted model
#[derive(Debug, Clone, Copy)]
pub struct ModelFitReport<'a> {
    /// The fitted model
    pub model: &'a FittedModel,
    /// Observed hesitancy rate of the modelled rows
    pub hesitancy_rate: f64,
    /// Where the outcome column came from, when known
    pub provenance: Option<OutcomeProvenance>,
    /// Threshold for the significant-factor list
    pub significance_level: f64,
}

impl ModelFitReport<'_> {
    /// Render the report
    #[must_use]
    pub fn render(&self) -> String {
        let model = self.model;
        let mut out = String::new();

        out.push_str("VACCINE HESITANCY LOGISTIC REGRESSION ANALYSIS\n");
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");
        out.push_str(&format!("Sample size: {}\n", model.n_obs()));
        out.push_str(&format!("Features: [{}]\n", model.features().join(", ")));
        out.push_str(&format!("Hesitancy rate: {:.3}\n", self.hesitancy_rate));
        if let Some(provenance) = self.provenance {
            out.push_str(&format!("Outcome provenance: {provenance}\n"));
            if provenance.is_degraded() {
                out.push_str(
                    "WARNING: the outcome was synthesized from demographic indicators, not observed.\n\
                     Estimates below describe that placeholder rule, not real hesitancy.\n",
                );
            }
        }
        out.push('\n');

        let rule = "=".repeat(78);
        let thin = "-".repeat(78);
        out.push_str(&format!("{:^78}\n", "Logit Regression Results"));
        out.push_str(&format!("{rule}\n"));
        out.push_str(&format!(
            "{:<20}{:>18}   {:<20}{:>17}\n",
            "Dep. Variable:", "vaccine_hesitant", "No. Observations:", model.n_obs()
        ));
        out.push_str(&format!(
            "{:<20}{:>18}   {:<20}{:>17}\n",
            "Method:", "MLE", "Df Residuals:", model.df_resid()
        ));
        out.push_str(&format!(
            "{:<20}{:>18}   {:<20}{:>17}\n",
            "Iterations:", model.iterations(), "Df Model:", model.df_model()
        ));
        out.push_str(&format!(
            "{:<20}{:>18.4}   {:<20}{:>17.4}\n",
            "Pseudo R-squ.:", model.pseudo_r_squared(), "Log-Likelihood:", model.log_likelihood()
        ));
        let llr_p = model
            .llr_p_value()
            .map_or_else(|| "nan".to_string(), |p| format!("{p:.4e}"));
        out.push_str(&format!(
            "{:<20}{:>18.4}   {:<20}{:>17}\n",
            "LL-Null:", model.null_log_likelihood(), "LLR p-value:", llr_p
        ));
        out.push_str(&format!(
            "{:<20}{:>18.2}   {:<20}{:>17.2}\n",
            "AIC:", model.aic(), "BIC:", model.bic()
        ));
        out.push_str(&format!("{rule}\n"));
        out.push_str(&format!(
            "{:<24}{:>10}{:>10}{:>9}{:>9}{:>8}{:>8}\n",
            "", "coef", "std err", "z", "P>|z|", "[0.025", "0.975]"
        ));
        out.push_str(&format!("{thin}\n"));
        for (i, feature) in model.features().iter().enumerate() {
            let coef = model.coefficients()[i];
            let se = model.std_errors()[i];
            out.push_str(&format!(
                "{:<24}{:>10.4}{:>10.3}{:>9.3}{:>9.3}{:>8.3}{:>8.3}\n",
                truncate(feature, 24),
                coef,
                se,
                model.z_values()[i],
                model.p_values()[i],
                coef - WALD_Z * se,
                coef + WALD_Z * se
            ));
        }
        out.push_str(&format!("{rule}\n"));

        let significant = model.significant_factors(self.significance_level);
        out.push('\n');
        if significant.is_empty() {
            out.push_str(&format!(
                "No significant factors (p < {}).\n",
                self.significance_level
            ));
        } else {
            out.push_str(&format!("Significant factors (p < {}):\n", self.significance_level));
            for row in &significant {
                out.push_str(&format!(
                    "  {}: OR={:.3} ({} hesitancy)\n",
                    row.feature,
                    row.odds_ratio,
                    if row.increases_odds() { "increases" } else { "decreases" }
                ));
            }
        }
        out
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
