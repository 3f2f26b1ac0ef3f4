use machine_learning::arch::{
    Domain,
    loss::{DomainLoss, LossFn, Norm},
};

use crate::config::LossType;

pub type BoxedLoss = Box<dyn LossFn + Send>;

/// Compares prediction and target as images, whatever domain the network outputs.
pub fn image_loss(output_domain: Domain, norm: Norm) -> DomainLoss {
    DomainLoss::image(output_domain, norm)
}

/// Compares prediction and target in k-space.
pub fn fourier_loss(output_domain: Domain, norm: Norm) -> DomainLoss {
    DomainLoss::fourier(output_domain, norm)
}

/// Compares the complex magnitudes of the images, ignoring their phase.
pub fn image_mag_loss(output_domain: Domain, norm: Norm) -> DomainLoss {
    DomainLoss::image_magnitude(output_domain, norm)
}

/// The objective the network is trained on.
pub fn select_loss(loss_type: LossType, output_domain: Domain, norm: Norm) -> BoxedLoss {
    match loss_type {
        LossType::Image => Box::new(image_loss(output_domain, norm)),
        LossType::Freq => Box::new(fourier_loss(output_domain, norm)),
    }
}

/// The metrics reported during every run regardless of the training loss.
pub fn monitoring_metrics(output_domain: Domain) -> Vec<BoxedLoss> {
    vec![
        Box::new(fourier_loss(output_domain, Norm::L1)),
        Box::new(fourier_loss(output_domain, Norm::L2)),
        Box::new(image_loss(output_domain, Norm::L1)),
        Box::new(image_loss(output_domain, Norm::L2)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freq_loss_type_selects_the_fourier_loss() {
        for domain in [Domain::Freq, Domain::Image] {
            let loss = select_loss(LossType::Freq, domain, Norm::L2);
            assert_eq!(loss.name(), "fourier_l2");
        }

        assert_eq!(
            select_loss(LossType::Image, Domain::Freq, Norm::L1).name(),
            "image_l1"
        );
    }

    #[test]
    fn monitoring_covers_both_domains_and_norms() {
        let names: Vec<_> = monitoring_metrics(Domain::Image)
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        assert_eq!(names, ["fourier_l1", "fourier_l2", "image_l1", "image_l2"]);
    }

    #[test]
    fn magnitude_loss_is_named_after_its_norm() {
        assert_eq!(image_mag_loss(Domain::Freq, Norm::L1).name(), "image_mag_l1");
    }
}
